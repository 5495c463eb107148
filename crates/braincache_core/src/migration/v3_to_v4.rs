use crate::migration::{MigrationError, MigrationResult, Migrator};
use crate::repo::dto::{CURRENT_SCHEMA_VERSION, PLACEHOLDER_SCHEMA_VERSION};
use std::path::Path;

/// Declared step towards the placeholder generation; always refuses.
pub struct V3ToV4;

impl Migrator for V3ToV4 {
    fn from_version(&self) -> u32 {
        CURRENT_SCHEMA_VERSION
    }

    fn to_version(&self) -> u32 {
        PLACEHOLDER_SCHEMA_VERSION
    }

    fn migrate(&self, _source: &Path, _target: &Path, _extension: &str) -> MigrationResult<()> {
        Err(MigrationError::Unsupported {
            from: CURRENT_SCHEMA_VERSION,
            to: PLACEHOLDER_SCHEMA_VERSION,
        })
    }
}
