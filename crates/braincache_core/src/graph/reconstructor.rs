//! Folder/file graph reconstruction.
//!
//! # Responsibility
//! - Resolve the UID references carried by loaded folders into a linked tree.
//! - Set derived parent back-references on every reachable folder and file.
//!
//! # Invariants
//! - Every folder is materialized at most once, however many references
//!   lead to it.
//! - A dangling child reference fails the whole reconstruction; no partial
//!   tree is returned.
//! - Linking parents never publishes `EntityChanged`.

use crate::model::entity::Shared;
use crate::model::file::File;
use crate::model::folder::Folder;
use crate::model::uid::Uid;
use log::{info, warn};
use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Referential-integrity failures found while rebuilding the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// Folder lists a file UID that was not loaded.
    ChildFileNotFound { parent: Uid, child: Uid },
    /// Folder lists a folder UID that was not loaded.
    ChildFolderNotFound { parent: Uid, child: Uid },
    /// Folder is reachable from itself through child links.
    CycleDetected { folder: Uid },
}

impl Display for GraphError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ChildFileNotFound { parent, child } => {
                write!(f, "folder {parent} references missing file {child}")
            }
            Self::ChildFolderNotFound { parent, child } => {
                write!(f, "folder {parent} references missing folder {child}")
            }
            Self::CycleDetected { folder } => {
                write!(f, "folder {folder} is its own ancestor")
            }
        }
    }
}

impl Error for GraphError {}

pub type GraphResult<T> = Result<T, GraphError>;

#[derive(Debug, Clone, Default)]
struct FolderNode {
    files: Vec<Uid>,
    folders: Vec<Uid>,
}

/// Linked view over the live folders and files.
///
/// Holds the same `Shared` instances the repositories cache; it owns no
/// entity state of its own.
#[derive(Debug, Default)]
pub struct FolderGraph {
    roots: Vec<Uid>,
    folders: HashMap<Uid, Shared<Folder>>,
    files: HashMap<Uid, Shared<File>>,
    nodes: HashMap<Uid, FolderNode>,
    folder_parents: HashMap<Uid, Uid>,
    file_parents: HashMap<Uid, Uid>,
}

impl FolderGraph {
    /// Root folder UIDs in ascending order.
    pub fn root_uids(&self) -> &[Uid] {
        &self.roots
    }

    pub fn roots(&self) -> Vec<Shared<Folder>> {
        self.roots
            .iter()
            .filter_map(|uid| self.folders.get(uid).cloned())
            .collect()
    }

    pub fn folder(&self, uid: Uid) -> Option<Shared<Folder>> {
        self.folders.get(&uid).cloned()
    }

    pub fn file(&self, uid: Uid) -> Option<Shared<File>> {
        self.files.get(&uid).cloned()
    }

    pub fn child_files(&self, folder: Uid) -> Vec<Shared<File>> {
        self.nodes
            .get(&folder)
            .map(|node| {
                node.files
                    .iter()
                    .filter_map(|uid| self.files.get(uid).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn child_folders(&self, folder: Uid) -> Vec<Shared<Folder>> {
        self.nodes
            .get(&folder)
            .map(|node| {
                node.folders
                    .iter()
                    .filter_map(|uid| self.folders.get(uid).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn parent_of(&self, folder: Uid) -> Option<Uid> {
        self.folder_parents.get(&folder).copied()
    }

    pub fn folder_of_file(&self, file: Uid) -> Option<Uid> {
        self.file_parents.get(&file).copied()
    }

    /// Parent chain of `folder`, nearest first.
    pub fn ancestors(&self, folder: Uid) -> Vec<Uid> {
        let mut chain = Vec::new();
        let mut cursor = self.parent_of(folder);
        while let Some(current) = cursor {
            if chain.contains(&current) {
                break;
            }
            chain.push(current);
            cursor = self.parent_of(current);
        }
        chain
    }

    pub fn is_descendant(&self, candidate: Uid, ancestor: Uid) -> bool {
        self.ancestors(candidate).contains(&ancestor)
    }

    pub fn folder_count(&self) -> usize {
        self.folders.len()
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Files not listed by any folder.
    pub fn orphan_files(&self) -> Vec<Uid> {
        let mut orphans: Vec<Uid> = self
            .files
            .keys()
            .filter(|uid| !self.file_parents.contains_key(uid))
            .copied()
            .collect();
        orphans.sort();
        orphans
    }
}

/// Rebuilds the folder tree from flat, UID-linked folders and files.
pub struct GraphReconstructor {
    folders: Vec<Shared<Folder>>,
    file_pool: HashMap<Uid, Shared<File>>,
}

impl GraphReconstructor {
    pub fn new(folders: Vec<Shared<Folder>>, files: Vec<Shared<File>>) -> Self {
        let file_pool = files
            .into_iter()
            .map(|file| {
                let uid = file.read().uid;
                (uid, file)
            })
            .collect();
        Self { folders, file_pool }
    }

    pub fn reconstruct(self) -> GraphResult<FolderGraph> {
        let started_at = Instant::now();
        let folder_pool: HashMap<Uid, Shared<Folder>> = self
            .folders
            .iter()
            .map(|folder| (folder.read().uid, folder.clone()))
            .collect();

        let mut pass = Pass {
            folder_pool: &folder_pool,
            file_pool: &self.file_pool,
            graph: FolderGraph {
                files: self.file_pool.clone(),
                ..FolderGraph::default()
            },
            in_progress: HashSet::new(),
        };

        let mut order: Vec<Uid> = folder_pool.keys().copied().collect();
        order.sort();
        for uid in &order {
            if let Err(err) = pass.materialize(*uid) {
                warn!(
                    "event=graph_reconstruct module=graph status=error error={}",
                    err
                );
                return Err(err);
            }
        }

        let mut graph = pass.graph;
        graph.roots = order
            .into_iter()
            .filter(|uid| !graph.folder_parents.contains_key(uid))
            .collect();
        for root in &graph.roots {
            if let Some(folder) = graph.folders.get(root) {
                folder.write().link_parent(None);
            }
        }
        for (uid, file) in &graph.files {
            if !graph.file_parents.contains_key(uid) {
                file.write().link_folder(None);
            }
        }

        let orphans = graph.orphan_files().len();
        if orphans > 0 {
            warn!(
                "event=graph_orphans module=graph status=skip orphan_files={}",
                orphans
            );
        }
        info!(
            "event=graph_reconstruct module=graph status=ok folders={} files={} roots={} duration_ms={}",
            graph.folder_count(),
            graph.file_count(),
            graph.roots.len(),
            started_at.elapsed().as_millis()
        );
        Ok(graph)
    }
}

struct Pass<'a> {
    folder_pool: &'a HashMap<Uid, Shared<Folder>>,
    file_pool: &'a HashMap<Uid, Shared<File>>,
    graph: FolderGraph,
    in_progress: HashSet<Uid>,
}

impl Pass<'_> {
    fn materialize(&mut self, uid: Uid) -> GraphResult<()> {
        if self.graph.nodes.contains_key(&uid) {
            return Ok(());
        }
        if !self.in_progress.insert(uid) {
            return Err(GraphError::CycleDetected { folder: uid });
        }
        let Some(folder) = self.folder_pool.get(&uid).cloned() else {
            self.in_progress.remove(&uid);
            return Ok(());
        };

        let (child_files, child_folders, selected) = {
            let guard = folder.read();
            (guard.files.clone(), guard.folders.clone(), guard.selected_file)
        };

        for child in &child_files {
            if !self.file_pool.contains_key(child) {
                return Err(GraphError::ChildFileNotFound { parent: uid, child: *child });
            }
        }
        for child in &child_folders {
            if !self.folder_pool.contains_key(child) {
                return Err(GraphError::ChildFolderNotFound { parent: uid, child: *child });
            }
            self.materialize(*child)?;
        }

        for child in &child_files {
            if self.link_file(uid, *child) {
                if let Some(file) = self.file_pool.get(child) {
                    file.write().link_folder(Some(uid));
                }
            }
        }
        for child in &child_folders {
            if self.link_folder(uid, *child) {
                if let Some(child_folder) = self.folder_pool.get(child) {
                    child_folder.write().link_parent(Some(uid));
                }
            }
        }

        if let Some(selected) = selected {
            if !child_files.contains(&selected) {
                warn!(
                    "event=graph_selection module=graph status=skip folder={} selected={} reason=not_a_member",
                    uid, selected
                );
                folder.write().selected_file = None;
            }
        }

        self.in_progress.remove(&uid);
        self.graph.folders.insert(uid, folder);
        self.graph.nodes.insert(
            uid,
            FolderNode {
                files: child_files,
                folders: child_folders,
            },
        );
        Ok(())
    }

    /// Records `child` under `parent`; a second parent is ignored.
    fn link_file(&mut self, parent: Uid, child: Uid) -> bool {
        match self.graph.file_parents.get(&child) {
            Some(existing) if *existing != parent => {
                warn!(
                    "event=graph_link module=graph status=skip file={} parent={} kept_parent={} reason=multiple_parents",
                    child, parent, existing
                );
                false
            }
            Some(_) => false,
            None => {
                self.graph.file_parents.insert(child, parent);
                true
            }
        }
    }

    fn link_folder(&mut self, parent: Uid, child: Uid) -> bool {
        match self.graph.folder_parents.get(&child) {
            Some(existing) if *existing != parent => {
                warn!(
                    "event=graph_link module=graph status=skip folder={} parent={} kept_parent={} reason=multiple_parents",
                    child, parent, existing
                );
                false
            }
            Some(_) => false,
            None => {
                self.graph.folder_parents.insert(child, parent);
                true
            }
        }
    }
}
