//! Persistence layer: versioned records, serializers and repositories.
//!
//! # See also
//! - `crate::migration` for moving records between schema generations.

pub mod dto;
pub mod entity_repo;
pub mod fs;
pub mod serializer;

pub use entity_repo::{EntityRepository, FlushReport, RepositorySettings, DEFAULT_FLUSH_DELAY};
pub use fs::{ProjectLayout, Trash};
pub use serializer::{DecodeError, EncodeError, EntitySerializer, FileSerializer, FolderSerializer};
