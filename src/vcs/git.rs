//! Native git management using the `git2` crate.
//!
//! Wraps `libgit2` for the repositories the orchestrator works with: the
//! signature repository, the detached-signature repository, the build
//! backend and the source repository.

use git2::{build::RepoBuilder, AutotagOption, FetchOptions, IndexAddOption, Oid, Repository};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during git operations
#[derive(Debug, Error)]
pub enum GitError {
    #[error("Repository error: {0}")]
    Repository(String),

    #[error("Clone error: {0}")]
    Clone(String),

    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("Checkout error: {0}")]
    Checkout(String),

    #[error("Reference not found: {0}")]
    RefNotFound(String),

    #[error("Commit error: {0}")]
    Commit(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Git2 error: {0}")]
    Git2(#[from] git2::Error),
}

/// Result type for git operations
pub type GitResult<T> = Result<T, GitError>;

fn progress_options<'a>(tag: &'static str) -> FetchOptions<'a> {
    let mut callbacks = git2::RemoteCallbacks::new();
    let mut last_percent = 0u32;
    callbacks.transfer_progress(move |progress| {
        let total = progress.total_objects();
        if total > 0 {
            let percent = (progress.received_objects() as f32 / total as f32 * 100.0) as u32;
            // One line per 10% step keeps large clones readable.
            if percent >= last_percent + 10 || (percent == 100 && last_percent != 100) {
                last_percent = percent;
                log::debug!(
                    "[Git] [{}] [PROGRESS] {}/{} objects ({} indexed) - {}%",
                    tag,
                    progress.received_objects(),
                    total,
                    progress.indexed_objects(),
                    percent
                );
            }
        }
        true
    });

    let mut options = FetchOptions::new();
    options.remote_callbacks(callbacks);
    options
}

/// Manages one local repository through native git bindings
#[derive(Debug, Clone)]
pub struct GitManager {
    repo_path: PathBuf,
}

impl GitManager {
    /// Creates a new GitManager for an existing repository
    pub fn new(repo_path: impl AsRef<Path>) -> GitResult<Self> {
        let repo_path = repo_path.as_ref().to_path_buf();
        Repository::open(&repo_path).map_err(|e| {
            GitError::Repository(format!(
                "Failed to open repository at {:?}: {}",
                repo_path, e
            ))
        })?;
        Ok(GitManager { repo_path })
    }

    fn open(&self) -> GitResult<Repository> {
        Repository::open(&self.repo_path)
            .map_err(|e| GitError::Repository(format!("Failed to open repository: {}", e)))
    }

    /// Clones a repository from a URL to the target path.
    ///
    /// Always a full clone: release tags and historic commits must be
    /// resolvable afterwards.
    pub fn clone(url: &str, target_path: impl AsRef<Path>) -> GitResult<Self> {
        let target_path = target_path.as_ref();
        log::info!("[Git] [CLONE] {} -> {}", url, target_path.display());

        let mut builder = RepoBuilder::new();
        builder.fetch_options(progress_options("CLONE"));
        builder.clone(url, target_path).map_err(|e| {
            log::error!("[Git] [CLONE] Clone failed: {}", e);
            GitError::Clone(format!("Failed to clone {} to {:?}: {}", url, target_path, e))
        })?;

        log::info!("[Git] [CLONE] Clone completed");
        GitManager::new(target_path)
    }

    /// Fetches branches and all tags from `origin`
    pub fn fetch(&self) -> GitResult<()> {
        let repo = self.open()?;
        let mut remote = repo
            .find_remote("origin")
            .map_err(|e| GitError::Repository(format!("Failed to find origin remote: {}", e)))?;

        let mut options = progress_options("FETCH");
        options.download_tags(AutotagOption::All);
        remote
            .fetch(&[] as &[&str], Some(&mut options), None)
            .map_err(|e| GitError::Fetch(format!("Fetch from origin failed: {}", e)))?;

        log::debug!("[Git] [FETCH] Fetched origin in {}", self.repo_path.display());
        Ok(())
    }

    /// Fetches a single ref from `url` and returns the commit it points to.
    ///
    /// The ref is not stored under any local name; the commit is read back
    /// from `FETCH_HEAD`.
    pub fn fetch_ref(&self, url: &str, refspec: &str) -> GitResult<String> {
        let repo = self.open()?;
        let mut remote = repo
            .remote_anonymous(url)
            .map_err(|e| GitError::Repository(format!("Invalid remote {}: {}", url, e)))?;

        log::info!("[Git] [FETCH] {} from {}", refspec, url);
        let mut options = progress_options("FETCH");
        remote
            .fetch(&[refspec], Some(&mut options), None)
            .map_err(|e| GitError::Fetch(format!("Failed to fetch {} from {}: {}", refspec, url, e)))?;

        let mut fetched: Option<Oid> = None;
        repo.fetchhead_foreach(|_name, _url, oid, _is_merge| {
            fetched.get_or_insert(*oid);
            true
        })?;

        fetched
            .map(|oid| oid.to_string())
            .ok_or_else(|| GitError::RefNotFound(format!("{} not found at {}", refspec, url)))
    }

    /// Checks out a specific commit, tag, or branch with a detached HEAD
    pub fn checkout(&self, reference: &str) -> GitResult<()> {
        let repo = self.open()?;

        let candidates = [reference.to_string(), format!("origin/{}", reference)];
        let obj = candidates
            .iter()
            .find_map(|name| repo.revparse_single(name).ok())
            .ok_or_else(|| {
                GitError::RefNotFound(format!("Failed to resolve reference '{}'", reference))
            })?;

        let commit = obj.peel_to_commit().map_err(|e| {
            GitError::Checkout(format!("'{}' does not name a commit: {}", reference, e))
        })?;

        let mut checkout = git2::build::CheckoutBuilder::new();
        checkout.force();
        repo.checkout_tree(commit.as_object(), Some(&mut checkout))
            .map_err(|e| GitError::Checkout(format!("Failed to check out {}: {}", reference, e)))?;
        repo.set_head_detached(commit.id())
            .map_err(|e| GitError::Checkout(format!("Failed to set HEAD: {}", e)))?;

        log::info!("[Git] [CHECKOUT] {} at {}", reference, commit.id());
        Ok(())
    }

    /// Gets the current HEAD commit hash
    pub fn get_head_commit(&self) -> GitResult<String> {
        let repo = self.open()?;
        let head = repo
            .head()
            .map_err(|e| GitError::Repository(format!("Failed to read HEAD: {}", e)))?;
        let commit_id = head
            .target()
            .ok_or_else(|| GitError::Repository("HEAD is not a direct reference".to_string()))?;
        Ok(commit_id.to_string())
    }

    /// Stages `paths` (relative to the repository root) and commits them.
    ///
    /// With `include_tracked`, modifications and deletions of already tracked
    /// files are staged as well. Returns `false` without committing when the
    /// resulting tree equals HEAD's tree.
    pub fn commit_paths(
        &self,
        paths: &[PathBuf],
        message: &str,
        include_tracked: bool,
    ) -> GitResult<bool> {
        let repo = self.open()?;
        let mut index = repo.index()?;

        let specs: Vec<String> = paths
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect();
        if !specs.is_empty() {
            index.add_all(specs, IndexAddOption::DEFAULT, None)?;
        }
        if include_tracked {
            index.update_all(["*"], None)?;
        }
        index.write()?;
        let tree_id = index.write_tree()?;

        let parent = match repo.head() {
            Ok(head) => Some(head.peel_to_commit()?),
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => None,
            Err(e) => return Err(e.into()),
        };
        if let Some(parent) = &parent {
            if parent.tree_id() == tree_id {
                log::info!("[Git] [COMMIT] Nothing to commit in {}", self.repo_path.display());
                return Ok(false);
            }
        }

        let tree = repo.find_tree(tree_id)?;
        let signature = repo.signature().map_err(|e| {
            GitError::Commit(format!(
                "No committer identity configured (user.name / user.email): {}",
                e
            ))
        })?;
        let parents: Vec<&git2::Commit> = parent.iter().collect();
        let oid = repo
            .commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)
            .map_err(|e| GitError::Commit(format!("Failed to commit: {}", e)))?;

        log::info!("[Git] [COMMIT] {} ({})", message, oid);
        Ok(true)
    }

    /// Returns the path to the repository
    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_manager_requires_repository() {
        let dir = tempfile::tempdir().unwrap();
        let result = GitManager::new(dir.path().join("missing"));
        assert!(matches!(result, Err(GitError::Repository(_))));
    }

    #[test]
    fn test_git_error_display() {
        let err = GitError::RefNotFound("v0.17.1".to_string());
        assert_eq!(err.to_string(), "Reference not found: v0.17.1");
    }
}
