//! CLI smoke entry point.
//!
//! # Responsibility
//! - Boot `braincache_core` against a documents directory: migrate, load,
//!   reconstruct, report counts, flush.
//! - Keep output deterministic for quick local sanity checks.
//!
//! Usage: `braincache_cli [documents-dir]`. Without an argument the
//! `BRAINCACHE_DOCUMENTS_DIR` variable or the user documents directory is used.

use braincache_core::{init_logging, StoreConfig, Workspace};
use log::error;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

const LOAD_TIMEOUT: Duration = Duration::from_secs(30);

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("braincache: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), String> {
    let mut config = StoreConfig::from_env().map_err(|err| err.to_string())?;
    if let Some(documents_dir) = std::env::args_os().nth(1) {
        config.documents_dir = PathBuf::from(documents_dir);
    }
    if config.documents_dir.is_relative() {
        let cwd = std::env::current_dir().map_err(|err| format!("cannot resolve cwd: {err}"))?;
        config.documents_dir = cwd.join(&config.documents_dir);
    }

    let layout = config.layout();
    init_logging(&config.log_level, &layout.logs_dir())?;

    println!("braincache_core version={}", braincache_core::core_version());
    println!("project_root={}", layout.root().display());

    let mut workspace = Workspace::start(config).map_err(|err| {
        error!("event=cli_start module=core status=error error={}", err);
        err.to_string()
    })?;
    workspace
        .load_blocking(LOAD_TIMEOUT)
        .map_err(|err| err.to_string())?;

    let tree = workspace.folder_tree().map_err(|err| err.to_string())?;
    println!(
        "folders={} files={} roots={} orphan_files={}",
        tree.folder_count(),
        tree.file_count(),
        tree.root_uids().len(),
        tree.orphan_files().len()
    );

    let report = workspace.shutdown();
    println!(
        "flushed folders={} files={}",
        report.folders.written, report.files.written
    );
    Ok(())
}
