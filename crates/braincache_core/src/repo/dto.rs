//! Versioned on-disk records.
//!
//! # Responsibility
//! - Describe the flat JSON shape of every schema generation (v1, v2, v3).
//! - Carry relationships as UIDs only, never embedded objects.
//!
//! # Invariants
//! - Field names match the persisted camelCase names exactly.
//! - Optional fields are omitted when absent and default when missing, so
//!   adding an optional field never breaks older records of a generation.
//! - A File record populates exactly one body field.

use crate::model::body::SortDirection;
use crate::model::uid::Uid;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Newest generation the serializers read and write.
pub const CURRENT_SCHEMA_VERSION: u32 = 3;

/// Declared but not implemented generation; migrating to it is unsupported.
pub const PLACEHOLDER_SCHEMA_VERSION: u32 = 4;

/// Opaque JSON-encoded body DTO, persisted as a base64 string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyBlob(pub Vec<u8>);

impl Serialize for BodyBlob {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for BodyBlob {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map(BodyBlob)
            .map_err(|err| D::Error::custom(format!("invalid base64 body: {err}")))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBodyDto {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableHeaderDto {
    pub title: String,
    pub ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableBodyDto {
    pub headers: Vec<TableHeaderDto>,
    pub rows: Vec<Vec<String>>,
    pub sort_type: SortDirection,
    pub sort_by_header_index: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListColumnDto {
    pub title: String,
    pub text: String,
    pub ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListBodyDto {
    pub columns: Vec<ListColumnDto>,
}

/// The three body slots shared by every File generation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BodySlots {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_body: Option<BodyBlob>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_body: Option<BodyBlob>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_file_body: Option<BodyBlob>,
}

impl BodySlots {
    pub fn populated(&self) -> usize {
        [
            self.text_body.is_some(),
            self.table_body.is_some(),
            self.list_file_body.is_some(),
        ]
        .into_iter()
        .filter(|populated| *populated)
        .count()
    }
}

pub mod v1 {
    use super::{BodySlots, Uid};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct FolderDto {
        pub uid: Uid,
        pub title: String,
        #[serde(rename = "selectedFileUID", default, skip_serializing_if = "Option::is_none")]
        pub selected_file_uid: Option<Uid>,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct FileDto {
        pub uid: Uid,
        #[serde(rename = "folderUID")]
        pub folder_uid: Uid,
        pub title: String,
        #[serde(flatten)]
        pub body: BodySlots,
        pub use_mono_font: bool,
    }
}

pub mod v2 {
    use super::Uid;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct FolderDto {
        pub uid: Uid,
        pub title: String,
        #[serde(rename = "selectedFileUID", default, skip_serializing_if = "Option::is_none")]
        pub selected_file_uid: Option<Uid>,
        #[serde(rename = "parentFolderUID", default, skip_serializing_if = "Option::is_none")]
        pub parent_folder_uid: Option<Uid>,
        #[serde(default)]
        pub is_opened: bool,
    }

    impl From<super::v1::FolderDto> for FolderDto {
        fn from(old: super::v1::FolderDto) -> Self {
            Self {
                uid: old.uid,
                title: old.title,
                selected_file_uid: old.selected_file_uid,
                parent_folder_uid: None,
                is_opened: false,
            }
        }
    }

    /// Same shape as v1: the folder link still lives on the file.
    pub type FileDto = super::v1::FileDto;
}

pub mod v3 {
    use super::{BodySlots, Uid};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct FolderDto {
        pub uid: Uid,
        pub title: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub selected_file: Option<Uid>,
        #[serde(default)]
        pub files: Vec<Uid>,
        #[serde(default)]
        pub folders: Vec<Uid>,
        #[serde(default)]
        pub is_opened: bool,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct FileDto {
        pub uid: Uid,
        pub title: String,
        #[serde(flatten)]
        pub body: BodySlots,
        pub use_mono_font: bool,
    }

    impl From<super::v2::FileDto> for FileDto {
        fn from(old: super::v2::FileDto) -> Self {
            Self {
                uid: old.uid,
                title: old.title,
                body: old.body,
                use_mono_font: old.use_mono_font,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{v1, v2, BodyBlob, BodySlots};
    use crate::model::uid::Uid;

    #[test]
    fn body_blob_is_persisted_as_base64_string() {
        let blob = BodyBlob(br#"{"text":"hi"}"#.to_vec());
        let json = serde_json::to_string(&blob).unwrap();
        assert_eq!(json, "\"eyJ0ZXh0IjoiaGkifQ==\"");
        let decoded: BodyBlob = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, blob);
    }

    #[test]
    fn v1_file_uses_persisted_field_names_and_omits_empty_bodies() {
        let dto = v1::FileDto {
            uid: Uid::from_raw(2),
            folder_uid: Uid::from_raw(1),
            title: "Notes".to_string(),
            body: BodySlots {
                text_body: Some(BodyBlob(b"{}".to_vec())),
                ..BodySlots::default()
            },
            use_mono_font: true,
        };
        let value: serde_json::Value = serde_json::to_value(&dto).unwrap();
        assert_eq!(value["folderUID"], 1);
        assert_eq!(value["useMonoFont"], true);
        assert!(value.get("textBody").is_some());
        assert!(value.get("tableBody").is_none());
        assert!(value.get("listFileBody").is_none());
    }

    #[test]
    fn v2_folder_reads_record_without_new_optional_fields() {
        let dto: v2::FolderDto =
            serde_json::from_str(r#"{"uid":7,"title":"Inbox","unknownLaterField":1}"#).unwrap();
        assert_eq!(dto.parent_folder_uid, None);
        assert!(!dto.is_opened);
    }
}
