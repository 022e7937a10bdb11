//! Version control seam.
//!
//! Phases talk to repositories through [`SourceControl`] so the orchestration
//! logic can run against [`RecordingVcs`] in tests. [`NativeGit`] is the
//! production implementation on top of `git2`.

pub mod git;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use self::git::{GitError, GitManager, GitResult};

/// Repository operations the orchestrator needs.
pub trait SourceControl {
    /// Clone `url` into `path` unless a repository already exists there.
    ///
    /// Returns whether a clone was made.
    fn ensure_clone(&self, url: &str, path: &Path) -> GitResult<bool>;

    /// Fetch `refspec` from `url` into the repository at `repo` and return
    /// the fetched commit.
    fn fetch_ref(&self, repo: &Path, url: &str, refspec: &str) -> GitResult<String>;

    /// Fetch `origin` and check out `rev` with a detached HEAD. Returns the
    /// commit HEAD points at afterwards.
    fn fetch_and_checkout(&self, repo: &Path, rev: &str) -> GitResult<String>;

    /// Stage `paths` (relative to `repo`) and commit. Returns `false` when
    /// there was nothing to commit.
    fn commit_paths(
        &self,
        repo: &Path,
        paths: &[PathBuf],
        message: &str,
        include_tracked: bool,
    ) -> GitResult<bool>;
}

/// `git2`-backed source control.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeGit;

impl SourceControl for NativeGit {
    fn ensure_clone(&self, url: &str, path: &Path) -> GitResult<bool> {
        if path.join(".git").exists() || GitManager::new(path).is_ok() {
            log::info!("[Git] {} already present, skipping clone", path.display());
            return Ok(false);
        }
        if path.exists() && path.read_dir()?.next().is_some() {
            return Err(GitError::Clone(format!(
                "{} exists and is not a git repository",
                path.display()
            )));
        }
        GitManager::clone(url, path)?;
        Ok(true)
    }

    fn fetch_ref(&self, repo: &Path, url: &str, refspec: &str) -> GitResult<String> {
        GitManager::new(repo)?.fetch_ref(url, refspec)
    }

    fn fetch_and_checkout(&self, repo: &Path, rev: &str) -> GitResult<String> {
        let manager = GitManager::new(repo)?;
        manager.fetch()?;
        manager.checkout(rev)?;
        manager.get_head_commit()
    }

    fn commit_paths(
        &self,
        repo: &Path,
        paths: &[PathBuf],
        message: &str,
        include_tracked: bool,
    ) -> GitResult<bool> {
        GitManager::new(repo)?.commit_paths(paths, message, include_tracked)
    }
}

/// A repository operation observed by [`RecordingVcs`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VcsCall {
    Clone {
        url: String,
        path: PathBuf,
    },
    FetchRef {
        repo: PathBuf,
        url: String,
        refspec: String,
    },
    Checkout {
        repo: PathBuf,
        rev: String,
    },
    Commit {
        repo: PathBuf,
        paths: Vec<PathBuf>,
        message: String,
        include_tracked: bool,
    },
}

/// In-memory source control that records calls.
///
/// `fetch_ref` and checkouts answer with the configured commit; commits report success
/// whenever at least one path is given or tracked files are included.
#[derive(Debug, Clone)]
pub struct RecordingVcs {
    calls: Arc<Mutex<Vec<VcsCall>>>,
    fetched_commit: String,
    fail_checkout: bool,
}

impl Default for RecordingVcs {
    fn default() -> Self {
        RecordingVcs::new()
    }
}

impl RecordingVcs {
    pub fn new() -> Self {
        RecordingVcs {
            calls: Arc::new(Mutex::new(Vec::new())),
            fetched_commit: "0123456789abcdef0123456789abcdef01234567".to_string(),
            fail_checkout: false,
        }
    }

    /// Commit returned by `fetch_ref`.
    pub fn with_fetched_commit(mut self, commit: impl Into<String>) -> Self {
        self.fetched_commit = commit.into();
        self
    }

    /// Make every checkout fail with a missing reference.
    pub fn failing_checkout(mut self) -> Self {
        self.fail_checkout = true;
        self
    }

    pub fn calls(&self) -> Vec<VcsCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Recorded commits as (paths, message, include_tracked).
    pub fn commits(&self) -> Vec<(Vec<PathBuf>, String, bool)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                VcsCall::Commit {
                    paths,
                    message,
                    include_tracked,
                    ..
                } => Some((paths, message, include_tracked)),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: VcsCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }
}

impl SourceControl for RecordingVcs {
    fn ensure_clone(&self, url: &str, path: &Path) -> GitResult<bool> {
        self.record(VcsCall::Clone {
            url: url.to_string(),
            path: path.to_path_buf(),
        });
        Ok(true)
    }

    fn fetch_ref(&self, repo: &Path, url: &str, refspec: &str) -> GitResult<String> {
        self.record(VcsCall::FetchRef {
            repo: repo.to_path_buf(),
            url: url.to_string(),
            refspec: refspec.to_string(),
        });
        Ok(self.fetched_commit.clone())
    }

    fn fetch_and_checkout(&self, repo: &Path, rev: &str) -> GitResult<String> {
        self.record(VcsCall::Checkout {
            repo: repo.to_path_buf(),
            rev: rev.to_string(),
        });
        if self.fail_checkout {
            return Err(GitError::RefNotFound(rev.to_string()));
        }
        Ok(self.fetched_commit.clone())
    }

    fn commit_paths(
        &self,
        repo: &Path,
        paths: &[PathBuf],
        message: &str,
        include_tracked: bool,
    ) -> GitResult<bool> {
        self.record(VcsCall::Commit {
            repo: repo.to_path_buf(),
            paths: paths.to_vec(),
            message: message.to_string(),
            include_tracked,
        });
        Ok(!paths.is_empty() || include_tracked)
    }
}
