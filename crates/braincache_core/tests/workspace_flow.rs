use braincache_core::model::file::DEFAULT_FILE_TITLE;
use braincache_core::model::folder::DEFAULT_FOLDER_TITLE;
use braincache_core::repo::{RepositorySettings, Trash};
use braincache_core::{
    shared, DomainEvent, Entity, EntityRepository, EntitySerializer, EventBus, File, FileBody,
    FileSerializer, Folder, FolderSerializer, MainQueue, MigrationError, RepoId, StoreConfig,
    TextBody, Uid, Workspace, WorkspaceError,
};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(10);

/// Long debounce window so only `shutdown` writes records in these tests.
fn config(documents: &Path) -> StoreConfig {
    StoreConfig::new(documents).with_flush_delay(Duration::from_secs(60))
}

fn started(documents: &Path) -> Workspace {
    let mut workspace = Workspace::start(config(documents)).unwrap();
    workspace.load_blocking(WAIT).unwrap();
    workspace
}

#[test]
fn new_folder_and_file_land_on_disk_after_debounce() {
    let documents = tempfile::tempdir().unwrap();
    let bus = EventBus::new();
    let queue = MainQueue::new();
    let root = documents.path().join("BrainCache").join("v3");
    let settings = |id, dir: &str| RepositorySettings {
        id,
        dir: root.join(dir),
        extension: "bc".to_string(),
        flush_delay: Duration::from_millis(50),
        trash: Trash::new(documents.path().join("BrainCache").join(".trash")),
    };
    let folders: EntityRepository<Folder> = EntityRepository::new(
        settings(RepoId::Folders, "folders"),
        FolderSerializer::new(bus.clone()),
        bus.clone(),
        queue.clone(),
    );
    let files: EntityRepository<File> = EntityRepository::new(
        settings(RepoId::Files, "files"),
        FileSerializer::new(bus.clone()),
        bus.clone(),
        queue.clone(),
    );
    let flushed = Arc::new(Mutex::new(HashSet::new()));
    let flushed_seen = Arc::clone(&flushed);
    let _subscription = bus.subscribe(move |event| {
        if let DomainEvent::RepositoryFlushed(id) = event {
            flushed_seen.lock().insert(*id);
        }
    });

    let folder = shared(Folder::with_uid(Uid::from_raw(1), DEFAULT_FOLDER_TITLE, bus.clone()));
    let file = shared(File::with_uid(
        Uid::from_raw(2),
        DEFAULT_FILE_TITLE,
        FileBody::Text(TextBody::new("")),
        bus.clone(),
    ));
    folders.write(folder.clone());
    files.write(file.clone());
    folder.write().add_file(Uid::from_raw(2));

    let observed = Arc::clone(&flushed);
    assert!(queue.run_until(WAIT, move || observed.lock().len() == 2));

    let folder_bytes = fs::read(root.join("folders").join("1.bc")).unwrap();
    let file_bytes = fs::read(root.join("files").join("2.bc")).unwrap();
    let decoded_folder = FolderSerializer::new(EventBus::new())
        .decode(&folder_bytes)
        .unwrap();
    let decoded_file = FileSerializer::new(EventBus::new())
        .decode(&file_bytes)
        .unwrap();
    assert_eq!(decoded_folder.title(), "New Folder");
    assert_eq!(decoded_folder.files(), &[Uid::from_raw(2)]);
    assert_eq!(decoded_file.title(), "New File");
    assert_eq!(decoded_file.body(), &FileBody::Text(TextBody::new("")));
}

#[test]
fn workspace_persists_and_reloads_tree() {
    let documents = tempfile::tempdir().unwrap();
    let (folder_uid, child_uid, file_uid) = {
        let workspace = started(documents.path());
        let folder = workspace.create_folder(None).unwrap();
        let folder_uid = folder.read().uid();
        let child = workspace.create_folder(Some(folder_uid)).unwrap();
        let child_uid = child.read().uid();
        let file = workspace.create_table_file(child_uid, 3).unwrap();
        let file_uid = file.read().uid();
        file.write().set_title("Budget");

        let report = workspace.shutdown();
        assert_eq!(report.folders.written, 2);
        assert_eq!(report.files.written, 1);
        (folder_uid, child_uid, file_uid)
    };

    let workspace = started(documents.path());
    let tree = workspace.folder_tree().unwrap();
    assert_eq!(tree.root_uids(), &[folder_uid]);
    assert_eq!(tree.parent_of(child_uid), Some(folder_uid));
    assert_eq!(tree.folder_of_file(file_uid), Some(child_uid));

    let file = workspace.files().read(file_uid).unwrap();
    assert_eq!(file.read().title(), "Budget");
    assert_eq!(file.read().folder(), Some(child_uid));
    assert!(matches!(file.read().body(), FileBody::Table(table) if table.headers().len() == 3));
    assert_eq!(workspace.root_folders().len(), 1);
}

#[test]
fn commands_before_load_are_rejected() {
    let documents = tempfile::tempdir().unwrap();
    let workspace = Workspace::start(config(documents.path())).unwrap();

    assert!(matches!(
        workspace.create_folder(None),
        Err(WorkspaceError::NotLoaded)
    ));
}

#[test]
fn folder_cannot_move_under_itself_or_a_descendant() {
    let documents = tempfile::tempdir().unwrap();
    let workspace = started(documents.path());
    let top = workspace.create_folder(None).unwrap().read().uid();
    let middle = workspace.create_folder(Some(top)).unwrap().read().uid();
    let bottom = workspace.create_folder(Some(middle)).unwrap().read().uid();

    assert!(matches!(
        workspace.move_folder(top, Some(top)),
        Err(WorkspaceError::CycleDetected { .. })
    ));
    assert!(matches!(
        workspace.move_folder(top, Some(bottom)),
        Err(WorkspaceError::CycleDetected { .. })
    ));

    workspace.move_folder(bottom, None).unwrap();
    let roots: Vec<Uid> = workspace
        .root_folders()
        .iter()
        .map(|folder| folder.read().uid())
        .collect();
    assert_eq!(roots, vec![top, bottom]);
    let middle_folder = workspace.folders().read(middle).unwrap();
    assert!(middle_folder.read().folders().is_empty());

    workspace.move_folder(top, Some(bottom)).unwrap();
    let tree = workspace.folder_tree().unwrap();
    assert_eq!(tree.ancestors(middle), vec![top, bottom]);
}

#[test]
fn moving_a_file_updates_both_folders() {
    let documents = tempfile::tempdir().unwrap();
    let workspace = started(documents.path());
    let source = workspace.create_folder(None).unwrap();
    let target = workspace.create_folder(None).unwrap();
    let source_uid = source.read().uid();
    let target_uid = target.read().uid();
    let file = workspace.create_text_file(source_uid).unwrap();
    let file_uid = file.read().uid();
    assert!(source.write().select_file(Some(file_uid)));

    workspace.move_file(file_uid, target_uid).unwrap();

    assert!(source.read().files().is_empty());
    assert_eq!(source.read().selected_file(), None);
    assert_eq!(target.read().files(), &[file_uid]);
    assert_eq!(file.read().folder(), Some(target_uid));
    assert!(matches!(
        workspace.move_file(file_uid, Uid::from_raw(-1)),
        Err(WorkspaceError::FolderNotFound(_))
    ));
}

#[test]
fn destroying_a_folder_trashes_its_whole_subtree() {
    let documents = tempfile::tempdir().unwrap();
    let workspace = started(documents.path());
    let keep = workspace.create_folder(None).unwrap().read().uid();
    let doomed = workspace.create_folder(None).unwrap().read().uid();
    let nested = workspace.create_folder(Some(doomed)).unwrap().read().uid();
    let file_a = workspace.create_text_file(doomed).unwrap().read().uid();
    let file_b = workspace.create_list_file(nested, 2).unwrap().read().uid();
    workspace.shutdown();

    let layout = workspace.layout().clone();
    let record = |dir: &Path, uid: Uid| dir.join(format!("{uid}.bc"));
    assert!(record(&layout.files_dir(3), file_b).exists());

    workspace.destroy_folder(doomed).unwrap();

    for uid in [doomed, nested] {
        assert!(!workspace.folders().has(uid));
        assert!(!record(&layout.folders_dir(3), uid).exists());
    }
    for uid in [file_a, file_b] {
        assert!(!workspace.files().has(uid));
        assert!(!record(&layout.files_dir(3), uid).exists());
    }
    assert!(workspace.folders().has(keep));
    assert_eq!(fs::read_dir(layout.trash_dir()).unwrap().count(), 4);
}

#[test]
fn destroying_a_file_detaches_it_from_its_folder() {
    let documents = tempfile::tempdir().unwrap();
    let workspace = started(documents.path());
    let folder = workspace.create_folder(None).unwrap();
    let folder_uid = folder.read().uid();
    let first = workspace.create_text_file(folder_uid).unwrap().read().uid();
    let second = workspace.create_text_file(folder_uid).unwrap().read().uid();
    assert!(folder.write().select_file(Some(second)));

    workspace.destroy_file(second).unwrap();

    assert_eq!(folder.read().files(), &[first]);
    assert_eq!(folder.read().selected_file(), Some(first));
    assert!(!workspace.files().has(second));
    assert!(matches!(
        workspace.destroy_file(second),
        Err(WorkspaceError::FileNotFound(_))
    ));
}

#[test]
fn placeholder_generation_blocks_startup() {
    let documents = tempfile::tempdir().unwrap();
    started(documents.path()).shutdown();

    let err = Workspace::start(config(documents.path()).with_schema_version(4))
        .err()
        .unwrap();

    assert!(matches!(
        err,
        WorkspaceError::Migration(MigrationError::Unsupported { from: 3, to: 4 })
    ));
}

#[test]
fn unsupported_target_is_rejected_before_touching_data() {
    let documents = tempfile::tempdir().unwrap();
    let layout = config(documents.path()).layout();
    fs::create_dir_all(layout.folders_dir(1)).unwrap();
    fs::write(
        layout.folders_dir(1).join("1.bc"),
        br#"{"uid":1,"title":"Inbox"}"#,
    )
    .unwrap();

    let err = Workspace::start(config(documents.path()).with_schema_version(2))
        .err()
        .unwrap();

    assert!(matches!(
        err,
        WorkspaceError::UnsupportedTarget {
            requested: 2,
            current: 3
        }
    ));
    assert!(layout.folders_dir(1).join("1.bc").exists());
    assert!(!layout.version_dir(2).exists());
    assert!(!layout.trash_dir().exists());
}
