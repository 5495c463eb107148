//! v1 -> v2: folders gain `parentFolderUID` and `isOpened`; files are
//! unchanged.

use crate::migration::{create_dir, read_records, write_record, MigrationError, MigrationResult, Migrator};
use crate::repo::dto::{v1, v2};
use crate::repo::fs::{copy_dir, files_subdir, folders_subdir};
use log::info;
use std::path::Path;

pub struct V1ToV2;

impl Migrator for V1ToV2 {
    fn from_version(&self) -> u32 {
        1
    }

    fn migrate(&self, source: &Path, target: &Path, extension: &str) -> MigrationResult<()> {
        let source_files = files_subdir(source);
        let target_files = files_subdir(target);
        if source_files.exists() {
            copy_dir(&source_files, &target_files).map_err(|err| {
                MigrationError::io(format!("copy {}", source_files.display()), err)
            })?;
        } else {
            create_dir(&target_files)?;
        }

        let folders: Vec<v1::FolderDto> = read_records(&folders_subdir(source), extension)?;
        let target_folders = folders_subdir(target);
        create_dir(&target_folders)?;
        let count = folders.len();
        for folder in folders {
            let upgraded = v2::FolderDto::from(folder);
            write_record(&target_folders, upgraded.uid, extension, &upgraded)?;
        }

        info!(
            "event=migration_transform module=migration status=ok from=1 to=2 folders={}",
            count
        );
        Ok(())
    }
}
