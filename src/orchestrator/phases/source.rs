//! Source resolution: bind the release spec to a concrete commit.
//!
//! Tags get a `v` prefix, commits and branches are used verbatim. Pull
//! requests fetch `refs/pull/N/merge` into the source clone (and into the
//! backend's own source cache when it exists) and build the fetched merge
//! commit under the label `pull-N`.

use crate::config::BuildConfig;
use crate::error::Result;
use crate::models::ResolvedRelease;
use crate::vcs::SourceControl;

/// Resolve the release and check it out in the source clone.
pub fn resolve_source<V: SourceControl>(config: &BuildConfig, vcs: &V) -> Result<ResolvedRelease> {
    let spec = &config.release;
    let source_dir = config.workspace.source_dir();

    let mut resolved = ResolvedRelease {
        version: spec.version.clone(),
        commit: spec.initial_commit(),
        url: spec.url.clone(),
    };

    if let Some(refspec) = spec.pull_refspec() {
        resolved.commit = vcs.fetch_ref(source_dir, &spec.url, &refspec)?;

        let cache = config.workspace.builder_source_cache(&config.project);
        if cache.exists() {
            let cached = vcs.fetch_ref(&cache, &spec.url, &refspec)?;
            if cached != resolved.commit {
                log::warn!(
                    "[Source] {} resolved to {} in the backend cache but {} in the source clone",
                    refspec,
                    cached,
                    resolved.commit
                );
            }
        } else {
            log::debug!(
                "[Source] Backend source cache {} not present yet",
                cache.display()
            );
        }

        resolved.version = format!("pull-{}", spec.version);
    }

    log::info!("[Source] Building {} at {}", resolved.version, resolved.commit);
    let head = vcs.fetch_and_checkout(source_dir, &resolved.commit)?;
    log::debug!("[Source] {} checked out at {}", source_dir.display(), head);
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::orchestrator::phases::test_support::{config_for, config_in};
    use crate::vcs::{RecordingVcs, VcsCall};
    use std::path::PathBuf;

    #[test]
    fn test_tag_gets_v_prefix() {
        let config = config_for(|_| {});
        let vcs = RecordingVcs::new();
        let resolved = resolve_source(&config, &vcs).unwrap();

        assert_eq!(resolved.commit, "v0.17.1");
        assert_eq!(resolved.version, "0.17.1");
        assert_eq!(
            vcs.calls(),
            vec![VcsCall::Checkout {
                repo: PathBuf::from("/work/monacoin"),
                rev: "v0.17.1".to_string(),
            }]
        );
    }

    #[test]
    fn test_commit_is_verbatim() {
        let config = config_for(|o| {
            o.commit = true;
            o.version = "feature-branch".to_string();
        });
        let resolved = resolve_source(&config, &RecordingVcs::new()).unwrap();
        assert_eq!(resolved.commit, "feature-branch");
        assert_eq!(resolved.version, "feature-branch");
    }

    #[test]
    fn test_pull_request_resolves_merge_commit() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path(), |o| {
            o.pull = true;
            o.version = "42".to_string();
        });
        std::fs::create_dir_all(config.workspace.builder_source_cache(&config.project)).unwrap();

        let vcs = RecordingVcs::new().with_fetched_commit("abc123");
        let resolved = resolve_source(&config, &vcs).unwrap();

        assert_eq!(resolved.version, "pull-42");
        assert_eq!(resolved.commit, "abc123");

        let calls = vcs.calls();
        let fetches: Vec<_> = calls
            .iter()
            .filter_map(|c| match c {
                VcsCall::FetchRef { repo, refspec, .. } => Some((repo.clone(), refspec.clone())),
                _ => None,
            })
            .collect();
        assert_eq!(fetches.len(), 2);
        assert!(fetches.iter().all(|(_, r)| r == "refs/pull/42/merge"));
        assert_eq!(fetches[0].0, dir.path().join("monacoin"));
        assert!(matches!(
            calls.last(),
            Some(VcsCall::Checkout { rev, .. }) if rev == "abc123"
        ));
    }

    #[test]
    fn test_checkout_failure_propagates() {
        let config = config_for(|_| {});
        let vcs = RecordingVcs::new().failing_checkout();
        assert!(matches!(
            resolve_source(&config, &vcs),
            Err(AppError::Git(_))
        ));
    }
}
