use braincache_core::{
    shared, EntitySerializer, EventBus, File, FileBody, Folder, FolderSerializer, GraphError,
    GraphReconstructor, Shared, TextBody, Uid,
};
use std::sync::Arc;

fn uid(raw: i64) -> Uid {
    Uid::from_raw(raw)
}

fn folder(raw: i64, files: &[i64], folders: &[i64]) -> Shared<Folder> {
    let mut folder = Folder::with_uid(uid(raw), format!("folder {raw}"), EventBus::new());
    for child in files {
        folder.add_file(uid(*child));
    }
    for child in folders {
        folder.add_folder(uid(*child));
    }
    shared(folder)
}

fn file(raw: i64) -> Shared<File> {
    shared(File::with_uid(
        uid(raw),
        format!("file {raw}"),
        FileBody::Text(TextBody::default()),
        EventBus::new(),
    ))
}

#[test]
fn folder_reachable_twice_materializes_once() {
    let root = folder(1, &[10], &[2]);
    let middle = folder(2, &[11], &[3]);
    let leaf = folder(3, &[], &[]);
    let files = vec![file(10), file(11)];

    let graph = GraphReconstructor::new(
        vec![leaf.clone(), middle.clone(), root.clone()],
        files.clone(),
    )
    .reconstruct()
    .unwrap();

    assert_eq!(graph.folder_count(), 3);
    assert_eq!(graph.file_count(), 2);
    assert_eq!(graph.root_uids(), &[uid(1)]);
    assert!(Arc::ptr_eq(&graph.folder(uid(3)).unwrap(), &leaf));
    assert!(Arc::ptr_eq(&graph.child_folders(uid(2))[0], &leaf));
    assert!(Arc::ptr_eq(&graph.child_files(uid(1))[0], &files[0]));

    assert_eq!(leaf.read().parent(), Some(uid(2)));
    assert_eq!(middle.read().parent(), Some(uid(1)));
    assert_eq!(root.read().parent(), None);
    assert_eq!(files[1].read().folder(), Some(uid(2)));
    assert_eq!(graph.ancestors(uid(3)), vec![uid(2), uid(1)]);
}

#[test]
fn reconstruction_is_idempotent() {
    let folders = vec![folder(1, &[10], &[2]), folder(2, &[], &[])];
    let files = vec![file(10), file(20)];

    let first = GraphReconstructor::new(folders.clone(), files.clone())
        .reconstruct()
        .unwrap();
    let second = GraphReconstructor::new(folders.clone(), files.clone())
        .reconstruct()
        .unwrap();

    assert_eq!(first.root_uids(), second.root_uids());
    assert_eq!(first.parent_of(uid(2)), second.parent_of(uid(2)));
    assert_eq!(first.folder_of_file(uid(10)), Some(uid(1)));
    assert_eq!(second.orphan_files(), vec![uid(20)]);
    assert_eq!(files[1].read().folder(), None);
}

#[test]
fn missing_child_file_names_parent_and_child() {
    let folders = vec![folder(1, &[10, 99], &[])];
    let files = vec![file(10)];

    let err = GraphReconstructor::new(folders, files)
        .reconstruct()
        .unwrap_err();
    assert_eq!(
        err,
        GraphError::ChildFileNotFound {
            parent: uid(1),
            child: uid(99)
        }
    );
}

#[test]
fn missing_child_folder_names_parent_and_child() {
    let folders = vec![folder(1, &[], &[2]), folder(2, &[], &[7])];

    let err = GraphReconstructor::new(folders, Vec::new())
        .reconstruct()
        .unwrap_err();
    assert_eq!(
        err,
        GraphError::ChildFolderNotFound {
            parent: uid(2),
            child: uid(7)
        }
    );
}

#[test]
fn folder_cycle_is_detected() {
    let folders = vec![folder(1, &[], &[2]), folder(2, &[], &[3]), folder(3, &[], &[1])];

    let err = GraphReconstructor::new(folders, Vec::new())
        .reconstruct()
        .unwrap_err();
    assert!(matches!(err, GraphError::CycleDetected { .. }));
}

#[test]
fn selection_outside_children_is_cleared() {
    let serializer = FolderSerializer::new(EventBus::new());
    let decoded = serializer
        .decode(br#"{"uid":1,"title":"t","selectedFile":5,"files":[10],"folders":[],"isOpened":true}"#)
        .unwrap();
    let decoded = shared(decoded);

    GraphReconstructor::new(vec![decoded.clone()], vec![file(10)])
        .reconstruct()
        .unwrap();

    assert_eq!(decoded.read().selected_file(), None);
    assert!(decoded.read().is_opened());
}
