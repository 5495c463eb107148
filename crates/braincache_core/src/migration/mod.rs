//! Schema-generation migrations for the on-disk project tree.
//!
//! # Responsibility
//! - Register one migrator per version step (`N -> N+1`).
//! - Detect the generation on disk and bring it forward before any
//!   repository opens it.
//!
//! # Invariants
//! - A missing step is a hard error, never a silent skip.
//! - Migrators only write into the staging directory handed to them; the
//!   pipeline owns renaming it into place and trashing the old generation.
//!
//! # See also
//! - `crate::repo::dto` for the record shape of each generation.

pub mod pipeline;
pub mod v1_to_v2;
pub mod v2_to_v3;
pub mod v3_to_v4;

use crate::model::uid::Uid;
use crate::repo::fs::{list_records, record_path};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub use pipeline::{MigrationOutcome, MigrationPipeline};
pub use v1_to_v2::V1ToV2;
pub use v2_to_v3::V2ToV3;
pub use v3_to_v4::V3ToV4;

/// Fatal migration failures; startup must not continue past any of them.
#[derive(Debug)]
pub enum MigrationError {
    /// Filesystem operation failed.
    Io { context: String, source: io::Error },
    /// A record of the old generation could not be read.
    Decode {
        path: PathBuf,
        source: serde_json::Error,
    },
    /// A record of the new generation could not be written.
    Encode {
        path: PathBuf,
        source: serde_json::Error,
    },
    /// No migrator is registered for `from -> from + 1`.
    MissingMigrator { from: u32 },
    /// The step exists but is declared unsupported.
    Unsupported { from: u32, to: u32 },
    /// Data on disk is newer than this build understands.
    UnsupportedSchemaVersion { found: u32, latest_supported: u32 },
}

impl Display for MigrationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { context, source } => write!(f, "{context}: {source}"),
            Self::Decode { path, source } => {
                write!(f, "cannot read record {}: {source}", path.display())
            }
            Self::Encode { path, source } => {
                write!(f, "cannot write record {}: {source}", path.display())
            }
            Self::MissingMigrator { from } => {
                write!(f, "no migrator registered for v{from} -> v{}", from + 1)
            }
            Self::Unsupported { from, to } => {
                write!(f, "migration v{from} -> v{to} is not supported")
            }
            Self::UnsupportedSchemaVersion {
                found,
                latest_supported,
            } => write!(
                f,
                "schema version v{found} on disk is newer than supported v{latest_supported}"
            ),
        }
    }
}

impl Error for MigrationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Decode { source, .. } | Self::Encode { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl MigrationError {
    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Stable code used in log lines.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Io { .. } => "io_failed",
            Self::Decode { .. } => "decode_failed",
            Self::Encode { .. } => "encode_failed",
            Self::MissingMigrator { .. } => "missing_migrator",
            Self::Unsupported { .. } => "unsupported_step",
            Self::UnsupportedSchemaVersion { .. } => "unsupported_schema_version",
        }
    }
}

pub type MigrationResult<T> = Result<T, MigrationError>;

/// One version step.
pub trait Migrator: Send + Sync {
    fn from_version(&self) -> u32;

    fn to_version(&self) -> u32 {
        self.from_version() + 1
    }

    /// Reads the `from_version` tree at `source` and writes the next
    /// generation into the empty directory `target`.
    fn migrate(&self, source: &Path, target: &Path, extension: &str) -> MigrationResult<()>;
}

/// Every step this build knows about, in version order.
pub fn default_migrators() -> Vec<Box<dyn Migrator>> {
    vec![Box::new(V1ToV2), Box::new(V2ToV3), Box::new(V3ToV4)]
}

/// Decodes every record in `dir`; a missing directory reads as empty.
pub(crate) fn read_records<D: DeserializeOwned>(
    dir: &Path,
    extension: &str,
) -> MigrationResult<Vec<D>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let paths = list_records(dir, extension)
        .map_err(|err| MigrationError::io(format!("list {}", dir.display()), err))?;
    let mut records = Vec::with_capacity(paths.len());
    for path in paths {
        let bytes = fs::read(&path)
            .map_err(|err| MigrationError::io(format!("read {}", path.display()), err))?;
        let record = serde_json::from_slice(&bytes)
            .map_err(|source| MigrationError::Decode { path, source })?;
        records.push(record);
    }
    Ok(records)
}

pub(crate) fn write_record<S: Serialize>(
    dir: &Path,
    uid: Uid,
    extension: &str,
    record: &S,
) -> MigrationResult<()> {
    let path = record_path(dir, uid, extension);
    let bytes = match serde_json::to_vec(record) {
        Ok(bytes) => bytes,
        Err(source) => return Err(MigrationError::Encode { path, source }),
    };
    fs::write(&path, bytes).map_err(|err| MigrationError::io(format!("write {}", path.display()), err))
}

pub(crate) fn create_dir(dir: &Path) -> MigrationResult<()> {
    fs::create_dir_all(dir)
        .map_err(|err| MigrationError::io(format!("create {}", dir.display()), err))
}
