//! Invocation validation.
//!
//! Turns raw [`BuildOptions`] into an immutable [`BuildConfig`]. Runs before
//! any external command, clone or filesystem change.

use std::path::Path;

use crate::config::{BuildConfig, BuildOptions, ProjectConfig};
use crate::error::UsageError;
use crate::models::{
    IsolationBackend, Operations, RefKind, ReleaseSpec, SignerIdentity, TargetSet,
};
use crate::system::paths::Workspace;

/// Validate options and build the invocation config.
///
/// Checks, in order: isolation backend conflict, empty signer, empty version,
/// commit/pull conflict, pull request number, target letters.
pub fn validate_options(
    options: &BuildOptions,
    project: ProjectConfig,
    workdir: &Path,
) -> Result<BuildConfig, UsageError> {
    validate_options_with_env(options, project, workdir, |key| std::env::var(key).ok())
}

/// Same as [`validate_options`] with an explicit environment lookup.
pub fn validate_options_with_env<F>(
    options: &BuildOptions,
    project: ProjectConfig,
    workdir: &Path,
    lookup: F,
) -> Result<BuildConfig, UsageError>
where
    F: Fn(&str) -> Option<String>,
{
    let backend = IsolationBackend::from_flags(options.kvm, options.docker)?;

    if options.signer.is_empty() {
        return Err(UsageError::MissingSigner);
    }
    if options.version.is_empty() {
        return Err(UsageError::MissingVersion);
    }

    let kind = RefKind::from_flags(options.commit, options.pull)?;
    if kind == RefKind::PullRequest && !options.version.chars().all(|c| c.is_ascii_digit()) {
        return Err(UsageError::InvalidPullRequest(options.version.clone()));
    }

    let targets = TargetSet::parse(&options.os)?;

    let operations = Operations::new(
        options.setup,
        options.build,
        options.sign,
        options.buildsign,
        options.verify,
    );

    let release = ReleaseSpec {
        url: options
            .url
            .clone()
            .unwrap_or_else(|| project.source_url.clone()),
        version: options.version.clone(),
        kind,
    };

    let workspace = Workspace::new(workdir, &project);

    Ok(BuildConfig {
        operations,
        targets,
        backend,
        release,
        signer: SignerIdentity::new(options.signer.clone(), options.detach_sign),
        jobs: options.jobs,
        memory: options.memory,
        commit_files: commit_policy(options),
        project,
        workspace,
        backend_env: backend.environment(lookup),
    })
}

/// Whether records get committed.
///
/// `--no-commit` always wins; detach-sign mode only commits on explicit request.
pub fn commit_policy(options: &BuildOptions) -> bool {
    if options.no_commit {
        return false;
    }
    if options.detach_sign {
        return options.commit_files;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SignProgram;

    fn options() -> BuildOptions {
        BuildOptions {
            build: true,
            os: "lwm".to_string(),
            jobs: 2,
            memory: 2000,
            signer: "alice".to_string(),
            version: "0.17.1".to_string(),
            ..BuildOptions::default()
        }
    }

    fn validate(options: &BuildOptions) -> Result<BuildConfig, UsageError> {
        validate_options_with_env(options, ProjectConfig::default(), Path::new("/work"), |_| None)
    }

    #[test]
    fn test_valid_options() {
        let config = validate(&options()).unwrap();
        assert_eq!(config.backend, IsolationBackend::Lxc);
        assert_eq!(config.release.kind, RefKind::Tag);
        assert_eq!(config.release.url, "https://github.com/monacoinproject/monacoin");
        assert_eq!(config.signer.program, SignProgram::Gpg);
        assert!(config.commit_files);
        assert!(config.operations.build);
    }

    #[test]
    fn test_missing_signer() {
        let opts = BuildOptions {
            signer: String::new(),
            ..options()
        };
        assert_eq!(validate(&opts).unwrap_err(), UsageError::MissingSigner);
    }

    #[test]
    fn test_missing_version() {
        let opts = BuildOptions {
            version: String::new(),
            ..options()
        };
        assert_eq!(validate(&opts).unwrap_err(), UsageError::MissingVersion);
    }

    #[test]
    fn test_backend_conflict_checked_first() {
        let opts = BuildOptions {
            kvm: true,
            docker: true,
            signer: String::new(),
            ..options()
        };
        assert_eq!(validate(&opts).unwrap_err(), UsageError::ConflictingBackends);
    }

    #[test]
    fn test_commit_and_pull_conflict() {
        let opts = BuildOptions {
            commit: true,
            pull: true,
            ..options()
        };
        assert_eq!(validate(&opts).unwrap_err(), UsageError::ConflictingRefModes);
    }

    #[test]
    fn test_pull_request_must_be_numeric() {
        let opts = BuildOptions {
            pull: true,
            version: "feature-x".to_string(),
            ..options()
        };
        assert!(matches!(
            validate(&opts).unwrap_err(),
            UsageError::InvalidPullRequest(_)
        ));
    }

    #[test]
    fn test_detach_sign_disables_commit_unless_requested() {
        let opts = BuildOptions {
            detach_sign: true,
            ..options()
        };
        let config = validate(&opts).unwrap();
        assert!(!config.commit_files);
        assert_eq!(config.signer.program, SignProgram::Placeholder);

        let opts = BuildOptions {
            detach_sign: true,
            commit_files: true,
            ..options()
        };
        assert!(validate(&opts).unwrap().commit_files);
    }

    #[test]
    fn test_no_commit_wins() {
        let opts = BuildOptions {
            no_commit: true,
            commit_files: true,
            ..options()
        };
        assert!(!validate(&opts).unwrap().commit_files);
    }

    #[test]
    fn test_docker_environment() {
        let opts = BuildOptions {
            docker: true,
            ..options()
        };
        let config = validate(&opts).unwrap();
        assert_eq!(
            config.backend_env,
            vec![("USE_DOCKER".to_string(), "1".to_string())]
        );
    }
}
