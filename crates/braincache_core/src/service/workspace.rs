//! Workspace orchestration use-cases.
//!
//! # Responsibility
//! - Run migrations, then build and open both repositories, in that order.
//! - Reconstruct the folder tree once both loads have landed.
//! - Validate tree commands (create, move, destroy) above the repositories.
//!
//! # Invariants
//! - Repositories never open against a generation older than the target.
//! - A folder is never moved under itself or one of its descendants.
//! - A child is written to its repository before its parent lists it.
//! - No entity guard is held across a repository call.

use crate::config::StoreConfig;
use crate::event::{EventBus, MainQueue, RepoId};
use crate::graph::{FolderGraph, GraphError, GraphReconstructor};
use crate::migration::{MigrationError, MigrationPipeline};
use crate::model::entity::{shared, Shared};
use crate::model::file::File;
use crate::model::folder::Folder;
use crate::model::uid::Uid;
use crate::repo::dto::{CURRENT_SCHEMA_VERSION, PLACEHOLDER_SCHEMA_VERSION};
use crate::repo::entity_repo::{EntityRepository, FlushReport, RepositorySettings};
use crate::repo::fs::ProjectLayout;
use crate::repo::serializer::{FileSerializer, FolderSerializer};
use log::{error, info};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io;
use std::time::Duration;

#[derive(Debug)]
pub enum WorkspaceError {
    /// Project directory could not be prepared.
    Io { context: String, source: io::Error },
    /// Configured generation is neither the current nor the next one.
    UnsupportedTarget { requested: u32, current: u32 },
    /// Data could not be brought to the target generation.
    Migration(MigrationError),
    /// Loaded records do not form a consistent tree.
    Graph(GraphError),
    /// Command requires the initial load to have finished.
    NotLoaded,
    FolderNotFound(Uid),
    FileNotFound(Uid),
    /// Move would place `folder` under itself or a descendant.
    CycleDetected { folder: Uid, parent: Uid },
}

impl Display for WorkspaceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { context, source } => write!(f, "{context}: {source}"),
            Self::UnsupportedTarget { requested, current } => write!(
                f,
                "schema version {requested} cannot be opened; current version is {current}"
            ),
            Self::Migration(err) => write!(f, "migration failed: {err}"),
            Self::Graph(err) => write!(f, "folder tree is inconsistent: {err}"),
            Self::NotLoaded => write!(f, "workspace has not finished loading"),
            Self::FolderNotFound(uid) => write!(f, "folder not found: {uid}"),
            Self::FileNotFound(uid) => write!(f, "file not found: {uid}"),
            Self::CycleDetected { folder, parent } => write!(
                f,
                "move would create cycle: folder {folder} under parent {parent}"
            ),
        }
    }
}

impl Error for WorkspaceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Migration(err) => Some(err),
            Self::Graph(err) => Some(err),
            _ => None,
        }
    }
}

impl From<MigrationError> for WorkspaceError {
    fn from(value: MigrationError) -> Self {
        Self::Migration(value)
    }
}

impl From<GraphError> for WorkspaceError {
    fn from(value: GraphError) -> Self {
        Self::Graph(value)
    }
}

pub type WorkspaceResult<T> = Result<T, WorkspaceError>;

/// Flush results of both repositories at shutdown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    pub folders: FlushReport,
    pub files: FlushReport,
}

/// Explicitly wired store: one bus, one main queue, two repositories.
pub struct Workspace {
    config: StoreConfig,
    layout: ProjectLayout,
    bus: EventBus,
    queue: MainQueue,
    folders: EntityRepository<Folder>,
    files: EntityRepository<File>,
    loaded: bool,
}

impl Workspace {
    /// Migrates the project root to `config.schema_version` and starts
    /// loading both repositories.
    ///
    /// # Errors
    /// - `UnsupportedTarget` when `config.schema_version` is neither the
    ///   current nor the placeholder generation; the disk is not touched.
    /// - `Io` when the project root cannot be created.
    /// - `Migration` for any migration failure, or when the target is not
    ///   the generation the serializers write; nothing is opened then.
    pub fn start(config: StoreConfig) -> WorkspaceResult<Self> {
        let layout = config.layout();
        info!(
            "event=workspace_start module=workspace status=start root={} target_version={}",
            layout.root().display(),
            config.schema_version
        );
        let target = config.schema_version;
        if target != CURRENT_SCHEMA_VERSION && target != PLACEHOLDER_SCHEMA_VERSION {
            error!(
                "event=workspace_start module=workspace status=error error_code=unsupported_target target_version={}",
                target
            );
            return Err(WorkspaceError::UnsupportedTarget {
                requested: target,
                current: CURRENT_SCHEMA_VERSION,
            });
        }
        std::fs::create_dir_all(layout.root()).map_err(|source| WorkspaceError::Io {
            context: format!("create {}", layout.root().display()),
            source,
        })?;

        let outcome = MigrationPipeline::with_default_migrators(layout.clone())
            .run(target)
            .map_err(|err| {
                error!(
                    "event=workspace_start module=workspace status=error error_code={} error={}",
                    err.code(),
                    err
                );
                WorkspaceError::from(err)
            })?;
        let version = outcome.version();
        if version != CURRENT_SCHEMA_VERSION {
            let err = MigrationError::Unsupported {
                from: CURRENT_SCHEMA_VERSION,
                to: version,
            };
            error!(
                "event=workspace_start module=workspace status=error error_code={} error={}",
                err.code(),
                err
            );
            return Err(err.into());
        }

        let bus = EventBus::new();
        let queue = MainQueue::new();
        let folders = EntityRepository::new(
            RepositorySettings {
                id: RepoId::Folders,
                dir: layout.folders_dir(version),
                extension: layout.extension().to_string(),
                flush_delay: config.flush_delay,
                trash: layout.trash(),
            },
            FolderSerializer::new(bus.clone()),
            bus.clone(),
            queue.clone(),
        );
        let files = EntityRepository::new(
            RepositorySettings {
                id: RepoId::Files,
                dir: layout.files_dir(version),
                extension: layout.extension().to_string(),
                flush_delay: config.flush_delay,
                trash: layout.trash(),
            },
            FileSerializer::new(bus.clone()),
            bus.clone(),
            queue.clone(),
        );
        folders.open();
        files.open();

        info!(
            "event=workspace_start module=workspace status=ok version={} outcome={:?}",
            version, outcome
        );
        Ok(Self {
            config,
            layout,
            bus,
            queue,
            folders,
            files,
            loaded: false,
        })
    }

    /// Drains the main queue; reconstructs the tree the first time both
    /// repositories are ready. Returns whether the workspace is loaded.
    pub fn poll(&mut self) -> WorkspaceResult<bool> {
        self.queue.run_pending();
        if self.loaded {
            return Ok(true);
        }
        if !(self.folders.is_ready() && self.files.is_ready()) {
            return Ok(false);
        }
        let graph = self.folder_tree()?;
        self.loaded = true;
        info!(
            "event=workspace_loaded module=workspace status=ok folders={} files={} roots={}",
            graph.folder_count(),
            graph.file_count(),
            graph.root_uids().len()
        );
        Ok(true)
    }

    /// Pumps the main queue until loaded or `timeout` elapses.
    pub fn load_blocking(&mut self, timeout: Duration) -> WorkspaceResult<()> {
        let folders = &self.folders;
        let files = &self.files;
        self.queue
            .run_until(timeout, || folders.is_ready() && files.is_ready());
        if self.poll()? {
            Ok(())
        } else {
            Err(WorkspaceError::NotLoaded)
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn layout(&self) -> &ProjectLayout {
        &self.layout
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn queue(&self) -> &MainQueue {
        &self.queue
    }

    pub fn folders(&self) -> &EntityRepository<Folder> {
        &self.folders
    }

    pub fn files(&self) -> &EntityRepository<File> {
        &self.files
    }

    /// Creates an empty folder at the root or under `parent`.
    pub fn create_folder(&self, parent: Option<Uid>) -> WorkspaceResult<Shared<Folder>> {
        self.ensure_loaded()?;
        let parent_folder = parent.map(|uid| self.folder(uid)).transpose()?;

        let folder = shared(Folder::new(self.bus.clone()));
        let uid = {
            let mut guard = folder.write();
            guard.link_parent(parent);
            guard.uid
        };
        self.folders.write(folder.clone());
        if let Some(parent_folder) = parent_folder {
            parent_folder.write().add_folder(uid);
        }
        info!(
            "event=folder_create module=workspace status=ok uid={} parent={}",
            uid,
            display_parent(parent)
        );
        Ok(folder)
    }

    pub fn create_text_file(&self, folder: Uid) -> WorkspaceResult<Shared<File>> {
        self.add_file(folder, File::new_text(self.bus.clone()))
    }

    pub fn create_table_file(&self, folder: Uid, columns: usize) -> WorkspaceResult<Shared<File>> {
        self.add_file(folder, File::new_table(columns, self.bus.clone()))
    }

    pub fn create_list_file(&self, folder: Uid, columns: usize) -> WorkspaceResult<Shared<File>> {
        self.add_file(folder, File::new_list(columns, self.bus.clone()))
    }

    fn add_file(&self, folder_uid: Uid, mut file: File) -> WorkspaceResult<Shared<File>> {
        self.ensure_loaded()?;
        let folder = self.folder(folder_uid)?;
        file.link_folder(Some(folder_uid));
        let uid = file.uid;
        let kind = file.body.kind_str();

        let file = shared(file);
        self.files.write(file.clone());
        folder.write().add_file(uid);
        info!(
            "event=file_create module=workspace status=ok uid={} folder={} body={}",
            uid, folder_uid, kind
        );
        Ok(file)
    }

    /// Moves a file into `target`, detaching it from its current folder.
    pub fn move_file(&self, file_uid: Uid, target: Uid) -> WorkspaceResult<()> {
        self.ensure_loaded()?;
        let file = self.file(file_uid)?;
        let target_folder = self.folder(target)?;
        let current = file.read().folder;
        if current == Some(target) {
            return Ok(());
        }

        if let Some(current_folder) = current.and_then(|uid| self.folders.read(uid)) {
            current_folder.write().remove_file(file_uid);
        }
        target_folder.write().add_file(file_uid);
        file.write().link_folder(Some(target));
        info!(
            "event=file_move module=workspace status=ok uid={} from={} to={}",
            file_uid,
            display_parent(current),
            target
        );
        Ok(())
    }

    /// Moves a folder to the root (`None`) or under `new_parent`.
    ///
    /// # Errors
    /// - `CycleDetected` when `new_parent` is the folder or a descendant.
    pub fn move_folder(&self, folder_uid: Uid, new_parent: Option<Uid>) -> WorkspaceResult<()> {
        self.ensure_loaded()?;
        let folder = self.folder(folder_uid)?;
        let target = match new_parent {
            Some(parent) => {
                if self.would_create_cycle(folder_uid, parent)? {
                    return Err(WorkspaceError::CycleDetected {
                        folder: folder_uid,
                        parent,
                    });
                }
                Some(self.folder(parent)?)
            }
            None => None,
        };

        let current = folder.read().parent;
        if current == new_parent {
            return Ok(());
        }
        if let Some(current_folder) = current.and_then(|uid| self.folders.read(uid)) {
            current_folder.write().remove_folder(folder_uid);
        }
        if let Some(target) = target {
            target.write().add_folder(folder_uid);
        }
        folder.write().link_parent(new_parent);
        info!(
            "event=folder_move module=workspace status=ok uid={} from={} to={}",
            folder_uid,
            display_parent(current),
            display_parent(new_parent)
        );
        Ok(())
    }

    /// Detaches a file from its folder and trashes its record.
    pub fn destroy_file(&self, file_uid: Uid) -> WorkspaceResult<()> {
        self.ensure_loaded()?;
        let file = self.file(file_uid)?;
        let parent = file.read().folder;
        if let Some(parent_folder) = parent.and_then(|uid| self.folders.read(uid)) {
            parent_folder.write().remove_file(file_uid);
        }
        self.files.remove(file_uid);
        info!(
            "event=file_destroy module=workspace status=ok uid={}",
            file_uid
        );
        Ok(())
    }

    /// Detaches a folder and trashes it with every descendant folder and file.
    pub fn destroy_folder(&self, folder_uid: Uid) -> WorkspaceResult<()> {
        self.ensure_loaded()?;
        let folder = self.folder(folder_uid)?;
        let parent = folder.read().parent;
        if let Some(parent_folder) = parent.and_then(|uid| self.folders.read(uid)) {
            parent_folder.write().remove_folder(folder_uid);
        }

        let mut visited = HashSet::new();
        let mut subtree = Vec::new();
        let mut file_uids = Vec::new();
        let mut stack = vec![folder_uid];
        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            subtree.push(current);
            if let Some(entry) = self.folders.read(current) {
                let guard = entry.read();
                file_uids.extend(guard.files.iter().copied());
                stack.extend(guard.folders.iter().copied());
            }
        }

        for uid in &file_uids {
            self.files.remove(*uid);
        }
        for uid in subtree.iter().rev() {
            self.folders.remove(*uid);
        }
        info!(
            "event=folder_destroy module=workspace status=ok uid={} folders={} files={}",
            folder_uid,
            subtree.len(),
            file_uids.len()
        );
        Ok(())
    }

    /// Folders without a parent, ordered by UID.
    pub fn root_folders(&self) -> Vec<Shared<Folder>> {
        let mut roots: Vec<(Uid, Shared<Folder>)> = self
            .folders
            .entities()
            .into_iter()
            .filter_map(|folder| {
                let (uid, parent) = {
                    let guard = folder.read();
                    (guard.uid, guard.parent)
                };
                parent.is_none().then_some((uid, folder))
            })
            .collect();
        roots.sort_by_key(|(uid, _)| *uid);
        roots.into_iter().map(|(_, folder)| folder).collect()
    }

    /// Fresh reconstruction over the current repository contents.
    pub fn folder_tree(&self) -> WorkspaceResult<FolderGraph> {
        GraphReconstructor::new(self.folders.entities(), self.files.entities())
            .reconstruct()
            .map_err(WorkspaceError::from)
    }

    /// Writes every pending change now and drains the main queue.
    pub fn shutdown(&self) -> ShutdownReport {
        let report = ShutdownReport {
            folders: self.folders.flush_now(),
            files: self.files.flush_now(),
        };
        self.queue.run_pending();
        info!(
            "event=workspace_shutdown module=workspace status=ok folders_written={} files_written={} failed={}",
            report.folders.written,
            report.files.written,
            report.folders.failed.len() + report.files.failed.len()
        );
        report
    }

    fn ensure_loaded(&self) -> WorkspaceResult<()> {
        if self.loaded {
            Ok(())
        } else {
            Err(WorkspaceError::NotLoaded)
        }
    }

    fn folder(&self, uid: Uid) -> WorkspaceResult<Shared<Folder>> {
        self.folders
            .read(uid)
            .ok_or(WorkspaceError::FolderNotFound(uid))
    }

    fn file(&self, uid: Uid) -> WorkspaceResult<Shared<File>> {
        self.files.read(uid).ok_or(WorkspaceError::FileNotFound(uid))
    }

    fn would_create_cycle(&self, folder: Uid, candidate_parent: Uid) -> WorkspaceResult<bool> {
        let mut visited = HashSet::new();
        let mut cursor = Some(candidate_parent);
        while let Some(current) = cursor {
            if current == folder || !visited.insert(current) {
                return Ok(true);
            }
            cursor = self.folder(current)?.read().parent;
        }
        Ok(false)
    }
}

fn display_parent(parent: Option<Uid>) -> String {
    parent.map_or_else(|| "root".to_string(), |uid| uid.to_string())
}
