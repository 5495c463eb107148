use crate::migration::{create_dir, default_migrators, MigrationError, MigrationResult, Migrator};
use crate::repo::fs::ProjectLayout;
use log::{error, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::time::Instant;

static VERSION_DIR_PATTERN: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^v([0-9]+)$").ok());

/// What `MigrationPipeline::run` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// No version directory existed; nothing to migrate.
    FreshInstall { version: u32 },
    /// Data was already at the target generation.
    UpToDate { version: u32 },
    Migrated { from: u32, to: u32 },
}

impl MigrationOutcome {
    pub fn version(self) -> u32 {
        match self {
            Self::FreshInstall { version } | Self::UpToDate { version } => version,
            Self::Migrated { to, .. } => to,
        }
    }
}

/// Ordered chain of one-step migrators over one project root.
pub struct MigrationPipeline {
    layout: ProjectLayout,
    migrators: BTreeMap<u32, Box<dyn Migrator>>,
}

impl MigrationPipeline {
    /// Pipeline with no registered steps.
    pub fn new(layout: ProjectLayout) -> Self {
        Self {
            layout,
            migrators: BTreeMap::new(),
        }
    }

    /// Pipeline with every step this build ships.
    pub fn with_default_migrators(layout: ProjectLayout) -> Self {
        default_migrators()
            .into_iter()
            .fold(Self::new(layout), |pipeline, migrator| pipeline.register_boxed(migrator))
    }

    /// Registers a step, replacing any step with the same `from_version`.
    pub fn register(self, migrator: impl Migrator + 'static) -> Self {
        self.register_boxed(Box::new(migrator))
    }

    fn register_boxed(mut self, migrator: Box<dyn Migrator>) -> Self {
        self.migrators.insert(migrator.from_version(), migrator);
        self
    }

    pub fn layout(&self) -> &ProjectLayout {
        &self.layout
    }

    /// Highest `v<N>` directory under the project root, if any.
    pub fn detect_version(&self) -> MigrationResult<Option<u32>> {
        let root = self.layout.root();
        if !root.exists() {
            return Ok(None);
        }
        let Some(pattern) = VERSION_DIR_PATTERN.as_ref() else {
            return Ok(None);
        };
        let entries = fs::read_dir(root)
            .map_err(|err| MigrationError::io(format!("list {}", root.display()), err))?;

        let mut found = None;
        for entry in entries {
            let entry =
                entry.map_err(|err| MigrationError::io(format!("list {}", root.display()), err))?;
            let is_dir = entry.file_type().map(|kind| kind.is_dir()).unwrap_or(false);
            if !is_dir {
                continue;
            }
            let name = entry.file_name();
            let version = pattern
                .captures(&name.to_string_lossy())
                .and_then(|captures| captures.get(1))
                .and_then(|digits| digits.as_str().parse::<u32>().ok());
            if let Some(version) = version {
                found = found.max(Some(version));
            }
        }
        Ok(found)
    }

    /// Brings the on-disk data to `target`.
    pub fn run(&self, target: u32) -> MigrationResult<MigrationOutcome> {
        let detected = self.detect_version()?;
        info!(
            "event=migration_detect module=migration status=ok root={} found={} target={}",
            self.layout.root().display(),
            detected.map_or_else(|| "none".to_string(), |version| version.to_string()),
            target
        );
        match detected {
            None => Ok(MigrationOutcome::FreshInstall { version: target }),
            Some(found) if found > target => {
                let err = MigrationError::UnsupportedSchemaVersion {
                    found,
                    latest_supported: target,
                };
                error!(
                    "event=migration_run module=migration status=error error_code={} error={}",
                    err.code(),
                    err
                );
                Err(err)
            }
            Some(found) if found == target => Ok(MigrationOutcome::UpToDate { version: found }),
            Some(found) => {
                self.migrate(found, target)?;
                Ok(MigrationOutcome::Migrated {
                    from: found,
                    to: target,
                })
            }
        }
    }

    /// Applies every step from `from` up to `to` in order.
    pub fn migrate(&self, from: u32, to: u32) -> MigrationResult<()> {
        if from > to {
            return Err(MigrationError::UnsupportedSchemaVersion {
                found: from,
                latest_supported: to,
            });
        }
        let started_at = Instant::now();
        info!(
            "event=migration_run module=migration status=start from={} to={}",
            from, to
        );
        let mut version = from;
        while version < to {
            if let Err(err) = self.step(version) {
                error!(
                    "event=migration_run module=migration status=error from={} to={} failed_at={} error_code={} error={}",
                    from,
                    to,
                    version,
                    err.code(),
                    err
                );
                return Err(err);
            }
            version += 1;
        }
        info!(
            "event=migration_run module=migration status=ok from={} to={} duration_ms={}",
            from,
            to,
            started_at.elapsed().as_millis()
        );
        Ok(())
    }

    fn step(&self, from: u32) -> MigrationResult<()> {
        let migrator = self
            .migrators
            .get(&from)
            .ok_or(MigrationError::MissingMigrator { from })?;
        let to = migrator.to_version();
        let source = self.layout.version_dir(from);
        let staging = self.layout.staging_dir(to);
        let target = self.layout.version_dir(to);

        if staging.exists() {
            warn!(
                "event=migration_step module=migration status=skip from={} to={} reason=stale_staging_removed",
                from, to
            );
            fs::remove_dir_all(&staging).map_err(|err| {
                MigrationError::io(format!("remove stale {}", staging.display()), err)
            })?;
        }
        create_dir(&staging)?;

        let extension = self.layout.extension();
        let result = migrator
            .migrate(&source, &staging, extension)
            .and_then(|()| {
                fs::rename(&staging, &target).map_err(|err| {
                    MigrationError::io(
                        format!("rename {} to {}", staging.display(), target.display()),
                        err,
                    )
                })
            });
        if let Err(err) = result {
            self.discard_staging(from, to);
            return Err(err);
        }

        match self.layout.trash().move_to_trash(&source) {
            Ok(trashed) => info!(
                "event=migration_step module=migration status=ok from={} to={} trashed={}",
                from,
                to,
                trashed.display()
            ),
            // The new generation is complete and detection prefers it.
            Err(err) => warn!(
                "event=migration_step module=migration status=ok from={} to={} error_code=trash_failed error={}",
                from, to, err
            ),
        }
        Ok(())
    }

    fn discard_staging(&self, from: u32, to: u32) {
        let staging = self.layout.staging_dir(to);
        if !staging.exists() {
            return;
        }
        if let Err(err) = fs::remove_dir_all(&staging) {
            error!(
                "event=migration_cleanup module=migration status=error from={} to={} dir={} error={}",
                from,
                to,
                staging.display(),
                err
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::MigrationPipeline;
    use crate::repo::fs::ProjectLayout;
    use std::fs;

    #[test]
    fn detect_version_ignores_non_version_entries() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["v1", "v12", ".staging-v13", ".trash", "v2x", "logs"] {
            fs::create_dir(dir.path().join(name)).unwrap();
        }
        fs::write(dir.path().join("v99"), b"not a dir").unwrap();

        let pipeline = MigrationPipeline::new(ProjectLayout::new(dir.path(), "bc"));
        assert_eq!(pipeline.detect_version().unwrap(), Some(12));
    }

    #[test]
    fn detect_version_of_missing_root_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = MigrationPipeline::new(ProjectLayout::new(dir.path().join("absent"), "bc"));
        assert_eq!(pipeline.detect_version().unwrap(), None);
    }
}
