//! Store configuration.
//!
//! # Responsibility
//! - Resolve the documents root and project directory.
//! - Carry the record extension, target schema version, debounce window and
//!   log level.
//!
//! # Invariants
//! - `from_env` never silently ignores an unparsable override.

use crate::logging::default_log_level;
use crate::repo::dto::CURRENT_SCHEMA_VERSION;
use crate::repo::entity_repo::DEFAULT_FLUSH_DELAY;
use crate::repo::fs::ProjectLayout;
use directories::{BaseDirs, UserDirs};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::time::Duration;

pub const ENV_DOCUMENTS_DIR: &str = "BRAINCACHE_DOCUMENTS_DIR";
pub const ENV_FLUSH_DELAY_MS: &str = "BRAINCACHE_FLUSH_DELAY_MS";
pub const ENV_LOG_LEVEL: &str = "BRAINCACHE_LOG_LEVEL";

pub const DEFAULT_PROJECT_DIR_NAME: &str = "BrainCache";
pub const DEFAULT_FILE_EXTENSION: &str = "bc";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Environment variable holds a value that cannot be used.
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { key, value, reason } => {
                write!(f, "invalid {key}=`{value}`: {reason}")
            }
        }
    }
}

impl Error for ConfigError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub documents_dir: PathBuf,
    pub project_dir_name: String,
    pub file_extension: String,
    pub schema_version: u32,
    pub flush_delay: Duration,
    pub log_level: String,
}

impl StoreConfig {
    /// Defaults rooted at an explicit documents directory.
    pub fn new(documents_dir: impl Into<PathBuf>) -> Self {
        Self {
            documents_dir: documents_dir.into(),
            project_dir_name: DEFAULT_PROJECT_DIR_NAME.to_string(),
            file_extension: DEFAULT_FILE_EXTENSION.to_string(),
            schema_version: CURRENT_SCHEMA_VERSION,
            flush_delay: DEFAULT_FLUSH_DELAY,
            log_level: default_log_level().to_string(),
        }
    }

    /// Defaults plus `BRAINCACHE_*` overrides from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env`, reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let documents_dir = match non_blank(lookup(ENV_DOCUMENTS_DIR)) {
            Some(value) => PathBuf::from(value),
            None => default_documents_dir(),
        };
        let mut config = Self::new(documents_dir);

        if let Some(value) = non_blank(lookup(ENV_FLUSH_DELAY_MS)) {
            let millis = value.trim().parse::<u64>().map_err(|err| ConfigError::InvalidValue {
                key: ENV_FLUSH_DELAY_MS,
                value: value.clone(),
                reason: err.to_string(),
            })?;
            config.flush_delay = Duration::from_millis(millis);
        }

        if let Some(value) = non_blank(lookup(ENV_LOG_LEVEL)) {
            let level = value.trim().to_ascii_lowercase();
            if !matches!(
                level.as_str(),
                "trace" | "debug" | "info" | "warn" | "warning" | "error"
            ) {
                return Err(ConfigError::InvalidValue {
                    key: ENV_LOG_LEVEL,
                    value,
                    reason: "expected trace|debug|info|warn|error".to_string(),
                });
            }
            config.log_level = level;
        }

        Ok(config)
    }

    pub fn with_flush_delay(mut self, flush_delay: Duration) -> Self {
        self.flush_delay = flush_delay;
        self
    }

    pub fn with_schema_version(mut self, schema_version: u32) -> Self {
        self.schema_version = schema_version;
        self
    }

    pub fn project_root(&self) -> PathBuf {
        self.documents_dir.join(&self.project_dir_name)
    }

    pub fn layout(&self) -> ProjectLayout {
        ProjectLayout::new(self.project_root(), self.file_extension.clone())
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

fn default_documents_dir() -> PathBuf {
    UserDirs::new()
        .and_then(|dirs| dirs.document_dir().map(|dir| dir.to_path_buf()))
        .or_else(|| BaseDirs::new().map(|dirs| dirs.home_dir().to_path_buf()))
        .unwrap_or_else(|| PathBuf::from("."))
}
