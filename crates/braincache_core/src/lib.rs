//! Entity persistence and schema migration for the BrainCache outliner.
//! Folders and files live in debounced JSON-file repositories, are linked
//! into a tree after load, and are migrated between on-disk generations
//! before anything opens them.

pub mod config;
pub mod event;
pub mod graph;
pub mod logging;
pub mod migration;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{ConfigError, StoreConfig};
pub use event::{DomainEvent, EventBus, MainQueue, RepoId, Subscription};
pub use graph::{FolderGraph, GraphError, GraphReconstructor};
pub use logging::{default_log_level, init_logging, logging_status};
pub use migration::{MigrationError, MigrationOutcome, MigrationPipeline, Migrator};
pub use model::body::{FileBody, ListBody, SortDirection, TableBody, TextBody};
pub use model::entity::{shared, Entity, EntityKind, EntityRef, Shared};
pub use model::file::File;
pub use model::folder::Folder;
pub use model::uid::Uid;
pub use repo::{
    EntityRepository, EntitySerializer, FileSerializer, FlushReport, FolderSerializer,
    ProjectLayout,
};
pub use service::{ShutdownReport, Workspace, WorkspaceError};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
