//! Entity <-> record encoding for the current schema generation.
//!
//! # Responsibility
//! - Encode live entities into v3 JSON records and decode them back.
//! - Compose per-variant body serializers for files.
//!
//! # Invariants
//! - `decode(encode(x)) == x` for every entity the serializers accept.
//! - Encoding refuses bodies that would not decode back (non-finite ratios,
//!   ragged table rows); decoding refuses ragged rows too.
//! - Every decoded UID is registered with the UID generator.

use crate::event::EventBus;
use crate::model::body::{FileBody, ListBody, ListColumn, TableBody, TableHeader, TextBody};
use crate::model::file::File;
use crate::model::folder::Folder;
use crate::model::uid::Uid;
use crate::repo::dto::{
    v3, BodyBlob, BodySlots, ListBodyDto, ListColumnDto, TableBodyDto, TableHeaderDto,
    TextBodyDto,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug)]
pub enum EncodeError {
    Json(serde_json::Error),
    InvalidBody { uid: Uid, reason: String },
}

impl Display for EncodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json(err) => write!(f, "record encoding failed: {err}"),
            Self::InvalidBody { uid, reason } => {
                write!(f, "file {uid} has an unencodable body: {reason}")
            }
        }
    }
}

impl Error for EncodeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Json(err) => Some(err),
            Self::InvalidBody { .. } => None,
        }
    }
}

impl From<serde_json::Error> for EncodeError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

#[derive(Debug)]
pub enum DecodeError {
    Json(serde_json::Error),
    MissingBody { uid: Uid },
    AmbiguousBody { uid: Uid },
    InvalidBodyBlob { uid: Uid, reason: String },
}

impl Display for DecodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json(err) => write!(f, "malformed record: {err}"),
            Self::MissingBody { uid } => write!(f, "file {uid} has no body"),
            Self::AmbiguousBody { uid } => write!(f, "file {uid} has more than one body"),
            Self::InvalidBodyBlob { uid, reason } => {
                write!(f, "file {uid} has a malformed body: {reason}")
            }
        }
    }
}

impl Error for DecodeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Json(err) => Some(err),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for DecodeError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

/// Encode/decode contract between one entity type and its on-disk record.
pub trait EntitySerializer<T>: Send + Sync {
    fn encode(&self, entity: &T) -> Result<Vec<u8>, EncodeError>;
    fn decode(&self, bytes: &[u8]) -> Result<T, DecodeError>;
}

/// Encodes one body variant into the opaque blob stored on a File record.
trait BodySerializer {
    type Body;
    type Dto: Serialize + DeserializeOwned;

    fn to_dto(&self, uid: Uid, body: &Self::Body) -> Result<Self::Dto, EncodeError>;
    fn from_dto(&self, uid: Uid, dto: Self::Dto) -> Result<Self::Body, DecodeError>;

    fn encode(&self, uid: Uid, body: &Self::Body) -> Result<BodyBlob, EncodeError> {
        let dto = self.to_dto(uid, body)?;
        Ok(BodyBlob(serde_json::to_vec(&dto)?))
    }

    fn decode(&self, uid: Uid, blob: &BodyBlob) -> Result<Self::Body, DecodeError> {
        let dto = serde_json::from_slice(&blob.0).map_err(|err| DecodeError::InvalidBodyBlob {
            uid,
            reason: err.to_string(),
        })?;
        self.from_dto(uid, dto)
    }
}

struct TextBodySerializer;

impl BodySerializer for TextBodySerializer {
    type Body = TextBody;
    type Dto = TextBodyDto;

    fn to_dto(&self, _uid: Uid, body: &TextBody) -> Result<TextBodyDto, EncodeError> {
        Ok(TextBodyDto {
            text: body.text.clone(),
        })
    }

    fn from_dto(&self, _uid: Uid, dto: TextBodyDto) -> Result<TextBody, DecodeError> {
        Ok(TextBody::new(dto.text))
    }
}

struct TableBodySerializer;

impl BodySerializer for TableBodySerializer {
    type Body = TableBody;
    type Dto = TableBodyDto;

    fn to_dto(&self, uid: Uid, body: &TableBody) -> Result<TableBodyDto, EncodeError> {
        ensure_finite_ratios(uid, body.headers().iter().map(|header| header.ratio))?;
        if let Some(reason) = ragged_row(body.headers().len(), body.rows()) {
            return Err(EncodeError::InvalidBody { uid, reason });
        }
        Ok(TableBodyDto {
            headers: body
                .headers()
                .iter()
                .map(|header| TableHeaderDto {
                    title: header.title.clone(),
                    ratio: header.ratio,
                })
                .collect(),
            rows: body.rows().to_vec(),
            sort_type: body.sort_direction(),
            sort_by_header_index: body.sort_column(),
        })
    }

    fn from_dto(&self, uid: Uid, dto: TableBodyDto) -> Result<TableBody, DecodeError> {
        if let Some(reason) = ragged_row(dto.headers.len(), &dto.rows) {
            return Err(DecodeError::InvalidBodyBlob { uid, reason });
        }
        Ok(TableBody::from_parts(
            dto.headers
                .into_iter()
                .map(|header| TableHeader {
                    title: header.title,
                    ratio: header.ratio,
                })
                .collect(),
            dto.rows,
            dto.sort_by_header_index,
            dto.sort_type,
        ))
    }
}

struct ListBodySerializer;

impl BodySerializer for ListBodySerializer {
    type Body = ListBody;
    type Dto = ListBodyDto;

    fn to_dto(&self, uid: Uid, body: &ListBody) -> Result<ListBodyDto, EncodeError> {
        ensure_finite_ratios(uid, body.columns().iter().map(|column| column.ratio))?;
        Ok(ListBodyDto {
            columns: body
                .columns()
                .iter()
                .map(|column| ListColumnDto {
                    title: column.title.clone(),
                    text: column.text.clone(),
                    ratio: column.ratio,
                })
                .collect(),
        })
    }

    fn from_dto(&self, _uid: Uid, dto: ListBodyDto) -> Result<ListBody, DecodeError> {
        Ok(ListBody::from_columns(
            dto.columns
                .into_iter()
                .map(|column| ListColumn {
                    title: column.title,
                    text: column.text,
                    ratio: column.ratio,
                })
                .collect(),
        ))
    }
}

/// Describes the first row whose cell count differs from `width`.
fn ragged_row(width: usize, rows: &[Vec<String>]) -> Option<String> {
    rows.iter()
        .position(|row| row.len() != width)
        .map(|index| format!("row {index} does not have {width} cells"))
}

fn ensure_finite_ratios(uid: Uid, ratios: impl Iterator<Item = f64>) -> Result<(), EncodeError> {
    for ratio in ratios {
        if !ratio.is_finite() {
            return Err(EncodeError::InvalidBody {
                uid,
                reason: format!("column ratio `{ratio}` is not finite"),
            });
        }
    }
    Ok(())
}

/// File serializer; decoded files are bound to `bus`.
pub struct FileSerializer {
    bus: EventBus,
    text: TextBodySerializer,
    table: TableBodySerializer,
    list: ListBodySerializer,
}

impl FileSerializer {
    pub fn new(bus: EventBus) -> Self {
        Self {
            bus,
            text: TextBodySerializer,
            table: TableBodySerializer,
            list: ListBodySerializer,
        }
    }

    pub fn to_dto(&self, file: &File) -> Result<v3::FileDto, EncodeError> {
        let mut body = BodySlots::default();
        match &file.body {
            FileBody::Text(text) => body.text_body = Some(self.text.encode(file.uid, text)?),
            FileBody::Table(table) => body.table_body = Some(self.table.encode(file.uid, table)?),
            FileBody::List(list) => body.list_file_body = Some(self.list.encode(file.uid, list)?),
        }
        Ok(v3::FileDto {
            uid: file.uid,
            title: file.title.clone(),
            body,
            use_mono_font: file.use_mono_font,
        })
    }

    pub fn from_dto(&self, dto: v3::FileDto) -> Result<File, DecodeError> {
        let uid = dto.uid;
        let body = self.decode_body(uid, &dto.body)?;
        Uid::observe(uid);
        let mut file = File::with_uid(uid, dto.title, body, self.bus.clone());
        file.use_mono_font = dto.use_mono_font;
        Ok(file)
    }

    /// Picks the populated body slot; exactly one must be present.
    pub(crate) fn decode_body(&self, uid: Uid, slots: &BodySlots) -> Result<FileBody, DecodeError> {
        match slots.populated() {
            0 => return Err(DecodeError::MissingBody { uid }),
            1 => {}
            _ => return Err(DecodeError::AmbiguousBody { uid }),
        }
        if let Some(blob) = &slots.text_body {
            return Ok(FileBody::Text(self.text.decode(uid, blob)?));
        }
        if let Some(blob) = &slots.table_body {
            return Ok(FileBody::Table(self.table.decode(uid, blob)?));
        }
        match &slots.list_file_body {
            Some(blob) => Ok(FileBody::List(self.list.decode(uid, blob)?)),
            None => Err(DecodeError::MissingBody { uid }),
        }
    }
}

impl EntitySerializer<File> for FileSerializer {
    fn encode(&self, entity: &File) -> Result<Vec<u8>, EncodeError> {
        Ok(serde_json::to_vec(&self.to_dto(entity)?)?)
    }

    fn decode(&self, bytes: &[u8]) -> Result<File, DecodeError> {
        self.from_dto(serde_json::from_slice(bytes)?)
    }
}

/// Folder serializer. Decoded folders carry child UIDs only; parent links are
/// established later by graph reconstruction.
pub struct FolderSerializer {
    bus: EventBus,
}

impl FolderSerializer {
    pub fn new(bus: EventBus) -> Self {
        Self { bus }
    }

    pub fn to_dto(&self, folder: &Folder) -> v3::FolderDto {
        v3::FolderDto {
            uid: folder.uid,
            title: folder.title.clone(),
            selected_file: folder.selected_file,
            files: folder.files.clone(),
            folders: folder.folders.clone(),
            is_opened: folder.is_opened,
        }
    }

    pub fn from_dto(&self, dto: v3::FolderDto) -> Folder {
        Uid::observe(dto.uid);
        let mut folder = Folder::with_uid(dto.uid, dto.title, self.bus.clone());
        folder.files = dedup_preserving_order(dto.files);
        folder.folders = dedup_preserving_order(dto.folders);
        folder.selected_file = dto.selected_file;
        folder.is_opened = dto.is_opened;
        folder
    }
}

impl EntitySerializer<Folder> for FolderSerializer {
    fn encode(&self, entity: &Folder) -> Result<Vec<u8>, EncodeError> {
        Ok(serde_json::to_vec(&self.to_dto(entity))?)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Folder, DecodeError> {
        Ok(self.from_dto(serde_json::from_slice(bytes)?))
    }
}

fn dedup_preserving_order(uids: Vec<Uid>) -> Vec<Uid> {
    let mut seen = std::collections::HashSet::with_capacity(uids.len());
    uids.into_iter().filter(|uid| seen.insert(*uid)).collect()
}
