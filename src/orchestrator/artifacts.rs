//! Artifact staging helpers.
//!
//! Backend outputs are located with simple shell-style patterns (`*` and `?`
//! in the file name, optional leading directory) and moved or copied with
//! overwrite semantics so a rerun after a partial failure replaces earlier
//! staging instead of accumulating it.

use regex::Regex;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use crate::config::BackendInput;
use crate::error::{ArtifactError, EnvironmentError};

/// Compile a file-name pattern into an anchored regex.
pub fn pattern_to_regex(pattern: &str) -> Result<Regex, ArtifactError> {
    if pattern.is_empty() || pattern.contains('/') {
        return Err(ArtifactError::InvalidPattern(pattern.to_string()));
    }

    let mut expr = String::with_capacity(pattern.len() + 8);
    expr.push('^');
    for ch in pattern.chars() {
        match ch {
            '*' => expr.push_str(".*"),
            '?' => expr.push('.'),
            other => expr.push_str(&regex::escape(&other.to_string())),
        }
    }
    expr.push('$');

    Regex::new(&expr).map_err(|_| ArtifactError::InvalidPattern(pattern.to_string()))
}

/// Files under `dir` matching `pattern`, sorted by name.
///
/// `pattern` may carry a leading relative directory (`src/P-*.tar.gz`).
/// A missing directory yields no matches.
pub fn find_matches(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>, ArtifactError> {
    let (sub_dir, file_pattern) = match pattern.rsplit_once('/') {
        Some((sub, file)) => (dir.join(sub), file),
        None => (dir.to_path_buf(), pattern),
    };
    let regex = pattern_to_regex(file_pattern)?;

    let entries = match fs::read_dir(&sub_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut matches = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        if regex.is_match(&entry.file_name().to_string_lossy()) {
            matches.push(entry.path());
        }
    }
    matches.sort();
    Ok(matches)
}

/// Move a file, replacing any existing destination.
///
/// Falls back to copy and remove when a rename is not possible (different
/// filesystems).
pub fn move_file(from: &Path, to: &Path) -> Result<(), ArtifactError> {
    let stage_err = |source| ArtifactError::Stage {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    };

    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent).map_err(stage_err)?;
    }
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    fs::copy(from, to).map_err(stage_err)?;
    fs::remove_file(from).map_err(stage_err)?;
    Ok(())
}

/// Copy a file, replacing any existing destination.
pub fn copy_file(from: &Path, to: &Path) -> Result<(), ArtifactError> {
    let stage_err = |source| ArtifactError::Stage {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    };
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent).map_err(stage_err)?;
    }
    fs::copy(from, to).map_err(stage_err)?;
    Ok(())
}

/// Move every file matching `pattern` under `dir` into `dest_dir`.
///
/// At least one file must match.
pub fn move_matching(
    dir: &Path,
    pattern: &str,
    dest_dir: &Path,
) -> Result<Vec<PathBuf>, ArtifactError> {
    let matches = find_matches(dir, pattern)?;
    if matches.is_empty() {
        return Err(ArtifactError::NoMatch {
            pattern: pattern.to_string(),
            dir: dir.to_path_buf(),
        });
    }

    let mut moved = Vec::with_capacity(matches.len());
    for source in matches {
        let Some(name) = source.file_name() else {
            continue;
        };
        let dest = dest_dir.join(name);
        log::debug!("[Artifacts] {} -> {}", source.display(), dest.display());
        move_file(&source, &dest)?;
        moved.push(dest);
    }
    Ok(moved)
}

/// Hex SHA-256 of a file.
pub fn sha256_file(path: &Path) -> std::io::Result<String> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Check a file against an expected hex digest.
pub fn verify_sha256(path: &Path, expected: &str) -> Result<(), EnvironmentError> {
    let actual = sha256_file(path)?;
    if actual.eq_ignore_ascii_case(expected.trim()) {
        Ok(())
    } else {
        Err(EnvironmentError::ChecksumMismatch {
            path: path.to_path_buf(),
            expected: expected.trim().to_string(),
            actual,
        })
    }
}

/// Ensure a pinned backend input is present in `inputs_dir`.
///
/// A file already present with the expected hash is kept; anything else is
/// downloaded again. The download only takes the final name once its hash
/// matches.
pub async fn fetch_input(
    client: &reqwest::Client,
    input: &BackendInput,
    inputs_dir: &Path,
) -> Result<PathBuf, EnvironmentError> {
    let dest = inputs_dir.join(input.file_name());

    if dest.is_file() && verify_sha256(&dest, &input.sha256).is_ok() {
        log::info!("[Inputs] {} already present and verified", dest.display());
        return Ok(dest);
    }

    log::info!("[Inputs] Downloading {}", input.url);
    let download_err = |e: reqwest::Error| EnvironmentError::DownloadFailed {
        url: input.url.clone(),
        reason: e.to_string(),
    };
    let body = client
        .get(&input.url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(download_err)?
        .bytes()
        .await
        .map_err(download_err)?;

    fs::create_dir_all(inputs_dir)?;
    let partial = dest.with_extension("part");
    fs::write(&partial, &body)?;
    if let Err(e) = verify_sha256(&partial, &input.sha256) {
        let _ = fs::remove_file(&partial);
        return Err(match e {
            EnvironmentError::ChecksumMismatch { expected, actual, .. } => {
                EnvironmentError::ChecksumMismatch { path: dest, expected, actual }
            }
            other => other,
        });
    }
    fs::rename(&partial, &dest)?;

    log::info!("[Inputs] {} verified ({} bytes)", dest.display(), body.len());
    Ok(dest)
}
