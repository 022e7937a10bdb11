//! Commit assertion records to the signature repository.

use std::path::PathBuf;

use crate::config::BuildConfig;
use crate::error::Result;
use crate::models::SignatureRecord;
use crate::vcs::SourceControl;

pub fn unsigned_message(version: &str, signer: &str) -> String {
    format!("Add {} unsigned sigs for {}", version, signer)
}

pub fn signed_message(version: &str, signer: &str) -> String {
    format!("Add {} signed binary sigs for {}", version, signer)
}

/// Stage the given records and commit them.
///
/// Records missing on disk are skipped with a warning. Returns whether a
/// commit was made.
pub fn commit_records<V: SourceControl>(
    config: &BuildConfig,
    vcs: &V,
    records: &[SignatureRecord],
    message: &str,
    include_tracked: bool,
) -> Result<bool> {
    let ws = &config.workspace;
    let mut paths: Vec<PathBuf> = Vec::new();
    for record in records {
        if ws.record_path(record).exists() {
            paths.push(record.relative_path());
        } else {
            log::warn!(
                "[Commit] Record {} not found, skipping",
                ws.record_path(record).display()
            );
        }
    }

    if paths.is_empty() && !include_tracked {
        log::info!("[Commit] Nothing to commit");
        return Ok(false);
    }

    log::info!("[Commit] {}", message);
    let committed = vcs.commit_paths(ws.sigs_dir(), &paths, message, include_tracked)?;
    Ok(committed)
}
