//! v2 -> v3: containment moves from child back-references to parent-owned
//! child lists.
//!
//! Files drop `folderUID`; folders drop `parentFolderUID` and instead list
//! `files` and `folders`. Both indexes are built from a full scan of the v2
//! records before any folder is written. Child lists are ordered by UID.

use crate::migration::{create_dir, read_records, write_record, MigrationResult, Migrator};
use crate::model::uid::Uid;
use crate::repo::dto::{v2, v3};
use crate::repo::fs::{files_subdir, folders_subdir};
use log::{info, warn};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

pub struct V2ToV3;

impl Migrator for V2ToV3 {
    fn from_version(&self) -> u32 {
        2
    }

    fn migrate(&self, source: &Path, target: &Path, extension: &str) -> MigrationResult<()> {
        let files: Vec<v2::FileDto> = read_records(&files_subdir(source), extension)?;
        let folders: Vec<v2::FolderDto> = read_records(&folders_subdir(source), extension)?;
        let known_folders: HashSet<Uid> = folders.iter().map(|folder| folder.uid).collect();

        let mut files_by_folder: BTreeMap<Uid, Vec<Uid>> = BTreeMap::new();
        for file in &files {
            if !known_folders.contains(&file.folder_uid) {
                warn!(
                    "event=migration_transform module=migration status=skip from=2 to=3 file={} folder={} reason=unknown_folder",
                    file.uid, file.folder_uid
                );
                continue;
            }
            files_by_folder.entry(file.folder_uid).or_default().push(file.uid);
        }

        let mut folders_by_parent: BTreeMap<Uid, Vec<Uid>> = BTreeMap::new();
        for folder in &folders {
            let Some(parent) = folder.parent_folder_uid else {
                continue;
            };
            if parent == folder.uid || !known_folders.contains(&parent) {
                warn!(
                    "event=migration_transform module=migration status=skip from=2 to=3 folder={} parent={} reason=invalid_parent",
                    folder.uid, parent
                );
                continue;
            }
            folders_by_parent.entry(parent).or_default().push(folder.uid);
        }

        let target_files = files_subdir(target);
        create_dir(&target_files)?;
        let file_count = files.len();
        for file in files {
            let upgraded = v3::FileDto::from(file);
            write_record(&target_files, upgraded.uid, extension, &upgraded)?;
        }

        let target_folders = folders_subdir(target);
        create_dir(&target_folders)?;
        let folder_count = folders.len();
        for folder in folders {
            let mut child_files = files_by_folder.remove(&folder.uid).unwrap_or_default();
            child_files.sort();
            let mut child_folders = folders_by_parent.remove(&folder.uid).unwrap_or_default();
            child_folders.sort();
            let selected_file = folder
                .selected_file_uid
                .filter(|selected| child_files.contains(selected));

            let upgraded = v3::FolderDto {
                uid: folder.uid,
                title: folder.title,
                selected_file,
                files: child_files,
                folders: child_folders,
                is_opened: folder.is_opened,
            };
            write_record(&target_folders, upgraded.uid, extension, &upgraded)?;
        }

        info!(
            "event=migration_transform module=migration status=ok from=2 to=3 folders={} files={}",
            folder_count, file_count
        );
        Ok(())
    }
}
