use braincache_core::model::body::{ListColumn, TableHeader};
use braincache_core::repo::dto::{v1, v2, v3, BodyBlob, BodySlots};
use braincache_core::repo::serializer::{DecodeError, EncodeError};
use braincache_core::{
    EntitySerializer, EventBus, File, FileBody, FileSerializer, Folder, FolderSerializer,
    ListBody, SortDirection, TableBody, TextBody, Uid,
};

fn uid(raw: i64) -> Uid {
    Uid::from_raw(raw)
}

fn roundtrip_file(file: &File) -> File {
    let serializer = FileSerializer::new(EventBus::new());
    let bytes = serializer.encode(file).unwrap();
    serializer.decode(&bytes).unwrap()
}

#[test]
fn text_file_roundtrips() {
    let mut file = File::with_uid(
        uid(41),
        "Journal",
        FileBody::Text(TextBody::new("line one\nline two")),
        EventBus::new(),
    );
    file.set_use_mono_font(true);

    assert_eq!(roundtrip_file(&file), file);
}

#[test]
fn table_file_roundtrips_with_uneven_ratios_and_empty_rows() {
    let table = TableBody::from_parts(
        vec![
            TableHeader {
                title: "Name".to_string(),
                ratio: 0.1,
            },
            TableHeader {
                title: "Notes".to_string(),
                ratio: 0.7,
            },
            TableHeader {
                title: "Due".to_string(),
                ratio: 0.2,
            },
        ],
        vec![
            vec!["b".to_string(), "x".to_string(), String::new()],
            vec![String::new(), String::new(), String::new()],
        ],
        2,
        SortDirection::Descending,
    );
    let file = File::with_uid(uid(42), "Tasks", FileBody::Table(table), EventBus::new());

    assert_eq!(roundtrip_file(&file), file);
}

#[test]
fn list_file_roundtrips() {
    let list = ListBody::from_columns(vec![
        ListColumn {
            title: "Left".to_string(),
            text: "- a\n- b".to_string(),
            ratio: 1.0 / 3.0,
        },
        ListColumn {
            title: "Right".to_string(),
            text: String::new(),
            ratio: 2.0 / 3.0,
        },
    ]);
    let file = File::with_uid(uid(43), "Lists", FileBody::List(list), EventBus::new());

    assert_eq!(roundtrip_file(&file), file);
}

#[test]
fn folder_roundtrips_children_selection_and_open_state() {
    let serializer = FolderSerializer::new(EventBus::new());
    let mut folder = Folder::with_uid(uid(50), "Projects", EventBus::new());
    folder.add_file(uid(51));
    folder.add_file(uid(52));
    folder.add_folder(uid(60));
    folder.select_file(Some(uid(52)));
    folder.set_opened(true);

    let decoded = serializer
        .decode(&serializer.encode(&folder).unwrap())
        .unwrap();
    assert_eq!(decoded, folder);
}

#[test]
fn encoded_file_uses_base64_body_slot_and_no_folder_field() {
    let serializer = FileSerializer::new(EventBus::new());
    let file = File::with_uid(
        uid(44),
        "Plain",
        FileBody::Text(TextBody::new("hi")),
        EventBus::new(),
    );

    let value: serde_json::Value = serde_json::from_slice(&serializer.encode(&file).unwrap()).unwrap();
    assert_eq!(value["textBody"], "eyJ0ZXh0IjoiaGkifQ==");
    assert!(value.get("tableBody").is_none());
    assert!(value.get("listFileBody").is_none());
    assert!(value.get("folderUID").is_none());
    assert_eq!(value["useMonoFont"], false);
}

#[test]
fn file_without_body_is_rejected() {
    let serializer = FileSerializer::new(EventBus::new());
    let err = serializer
        .decode(br#"{"uid":5,"title":"t","useMonoFont":false}"#)
        .unwrap_err();
    assert!(matches!(err, DecodeError::MissingBody { .. }));
}

#[test]
fn file_with_two_bodies_is_rejected() {
    let serializer = FileSerializer::new(EventBus::new());
    let record = v3::FileDto {
        uid: uid(6),
        title: "t".to_string(),
        body: BodySlots {
            text_body: Some(BodyBlob(br#"{"text":""}"#.to_vec())),
            list_file_body: Some(BodyBlob(br#"{"columns":[]}"#.to_vec())),
            ..BodySlots::default()
        },
        use_mono_font: false,
    };
    let err = serializer
        .decode(&serde_json::to_vec(&record).unwrap())
        .unwrap_err();
    assert!(matches!(err, DecodeError::AmbiguousBody { .. }));
}

#[test]
fn table_with_ragged_rows_is_rejected_both_ways() {
    let serializer = FileSerializer::new(EventBus::new());
    let table = serde_json::json!({
        "headers": [{"title": "A", "ratio": 0.5}, {"title": "B", "ratio": 0.5}],
        "rows": [["x", "y"], ["only one"]],
        "sortType": "ascending",
        "sortByHeaderIndex": 0,
    });
    let record = v3::FileDto {
        uid: uid(5),
        title: "t".to_string(),
        body: BodySlots {
            table_body: Some(BodyBlob(serde_json::to_vec(&table).unwrap())),
            ..BodySlots::default()
        },
        use_mono_font: false,
    };
    let err = serializer
        .decode(&serde_json::to_vec(&record).unwrap())
        .unwrap_err();
    assert!(matches!(err, DecodeError::InvalidBodyBlob { .. }));

    let ragged = TableBody::from_parts(
        vec![
            TableHeader {
                title: "A".to_string(),
                ratio: 0.5,
            },
            TableHeader {
                title: "B".to_string(),
                ratio: 0.5,
            },
        ],
        vec![vec!["only one".to_string()]],
        0,
        SortDirection::Ascending,
    );
    let file = File::with_uid(uid(7), "t", FileBody::Table(ragged), EventBus::new());
    assert!(matches!(
        serializer.encode(&file),
        Err(EncodeError::InvalidBody { .. })
    ));
}

#[test]
fn malformed_record_is_a_json_error() {
    let serializer = FolderSerializer::new(EventBus::new());
    let err = serializer.decode(b"{\"uid\":").unwrap_err();
    assert!(matches!(err, DecodeError::Json(_)));
}

#[test]
fn decoded_uids_are_never_reissued() {
    let far_future = Uid::from_raw(i64::MAX / 2);
    let serializer = FolderSerializer::new(EventBus::new());
    let folder = Folder::with_uid(far_future, "Later", EventBus::new());
    serializer
        .decode(&serializer.encode(&folder).unwrap())
        .unwrap();

    assert!(Uid::next() > far_future);
}

#[test]
fn older_generation_records_roundtrip() {
    let folder_v1 = v1::FolderDto {
        uid: uid(1),
        title: "Inbox".to_string(),
        selected_file_uid: Some(uid(2)),
    };
    let json = serde_json::to_string(&folder_v1).unwrap();
    assert!(json.contains("\"selectedFileUID\":2"));
    assert_eq!(serde_json::from_str::<v1::FolderDto>(&json).unwrap(), folder_v1);

    let folder_v2 = v2::FolderDto {
        uid: uid(1),
        title: "Inbox".to_string(),
        selected_file_uid: None,
        parent_folder_uid: Some(uid(9)),
        is_opened: true,
    };
    let json = serde_json::to_string(&folder_v2).unwrap();
    assert!(json.contains("\"parentFolderUID\":9"));
    assert!(!json.contains("selectedFileUID"));
    assert_eq!(serde_json::from_str::<v2::FolderDto>(&json).unwrap(), folder_v2);

    let file_v2 = v2::FileDto {
        uid: uid(2),
        folder_uid: uid(1),
        title: "Note".to_string(),
        body: BodySlots {
            table_body: Some(BodyBlob(b"{}".to_vec())),
            ..BodySlots::default()
        },
        use_mono_font: true,
    };
    let json = serde_json::to_string(&file_v2).unwrap();
    assert_eq!(serde_json::from_str::<v2::FileDto>(&json).unwrap(), file_v2);
}
