//! Filesystem primitives for the project directory.
//!
//! # Responsibility
//! - Derive every on-disk path from the project root and record extension.
//! - Move deleted records and retired version directories into a
//!   recoverable trash instead of unlinking them.
//!
//! # Invariants
//! - Trash and staging directory names never match `^v[0-9]+$`.
//! - `Trash::move_to_trash` never overwrites an earlier trashed item.

use crate::model::uid::Uid;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

const FOLDERS_DIR_NAME: &str = "folders";
const FILES_DIR_NAME: &str = "files";
const TRASH_DIR_NAME: &str = ".trash";
const LOGS_DIR_NAME: &str = "logs";

/// Paths of one project root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
    root: PathBuf,
    extension: String,
}

impl ProjectLayout {
    pub fn new(root: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            extension: extension.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn version_dir(&self, version: u32) -> PathBuf {
        self.root.join(format!("v{version}"))
    }

    pub fn folders_dir(&self, version: u32) -> PathBuf {
        self.version_dir(version).join(FOLDERS_DIR_NAME)
    }

    pub fn files_dir(&self, version: u32) -> PathBuf {
        self.version_dir(version).join(FILES_DIR_NAME)
    }

    /// Scratch directory a migration writes into before it is renamed to
    /// `version_dir(version)`.
    pub fn staging_dir(&self, version: u32) -> PathBuf {
        self.root.join(format!(".staging-v{version}"))
    }

    pub fn trash_dir(&self) -> PathBuf {
        self.root.join(TRASH_DIR_NAME)
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join(LOGS_DIR_NAME)
    }

    pub fn trash(&self) -> Trash {
        Trash::new(self.trash_dir())
    }

    pub fn record_path(&self, dir: &Path, uid: Uid) -> PathBuf {
        record_path(dir, uid, &self.extension)
    }
}

pub fn record_path(dir: &Path, uid: Uid, extension: &str) -> PathBuf {
    dir.join(format!("{uid}.{extension}"))
}

pub fn folders_subdir(version_dir: &Path) -> PathBuf {
    version_dir.join(FOLDERS_DIR_NAME)
}

pub fn files_subdir(version_dir: &Path) -> PathBuf {
    version_dir.join(FILES_DIR_NAME)
}

/// Lists regular files in `dir` with the given extension, sorted by path.
pub fn list_records(dir: &Path, extension: &str) -> io::Result<Vec<PathBuf>> {
    let mut records = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let matches = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext == extension);
        if matches && entry.file_type()?.is_file() {
            records.push(path);
        }
    }
    records.sort();
    Ok(records)
}

/// Recursively copies `from` into `to`, creating `to` when missing.
pub fn copy_dir(from: &Path, to: &Path) -> io::Result<()> {
    fs::create_dir_all(to)?;
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        let target = to.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Recoverable deletion target inside the project root.
#[derive(Debug, Clone)]
pub struct Trash {
    dir: PathBuf,
}

static TRASH_SEQUENCE: AtomicU64 = AtomicU64::new(0);

impl Trash {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Moves a file or directory into the trash and returns its new path.
    pub fn move_to_trash(&self, path: &Path) -> io::Result<PathBuf> {
        let name = path.file_name().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("cannot trash `{}`: no file name", path.display()),
            )
        })?;
        fs::create_dir_all(&self.dir)?;

        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis())
            .unwrap_or(0);
        loop {
            let sequence = TRASH_SEQUENCE.fetch_add(1, Ordering::SeqCst);
            let target = self.dir.join(format!(
                "{millis}-{sequence}-{}",
                name.to_string_lossy()
            ));
            if target.exists() {
                continue;
            }
            fs::rename(path, &target)?;
            return Ok(target);
        }
    }
}
