//! Orchestrator phases: one module per pipeline stage.
//!
//! - **Setup** (`prep`) - host packages, repositories, base image
//! - **Source** (`source`) - resolve the release to a commit and check it out
//! - **Build** (`build`) - backend inputs, builds, unsigned assertions, artifacts
//! - **Sign** (`sign`) - code signing of Windows and macOS outputs
//! - **Verify** (`verify`) - check recorded assertions
//! - **Commit** (`commit`) - commit assertion records to the signature repository
//!
//! Every phase takes the immutable `BuildConfig` and receives its external
//! collaborators (step runner, source control) as parameters, so each one
//! can be driven in isolation.

pub mod build;
pub mod commit;
pub mod prep;
pub mod sign;
pub mod source;
pub mod verify;

pub use build::run_build;
pub use commit::commit_records;
pub use prep::{prepare_environment, SetupOutcome};
pub use sign::run_sign;
pub use source::resolve_source;
pub use verify::run_verify;

use std::path::Path;

use crate::config::BuildConfig;
use crate::models::{ArtifactSet, ReleaseDir, SignatureRecord};
use crate::orchestrator::executor::Step;

/// What a build or sign phase produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhaseReport {
    pub artifacts: Vec<ArtifactSet>,
    pub records: Vec<SignatureRecord>,
}

/// Backend tool invocation, run from the backend directory with the
/// isolation environment exported.
pub(crate) fn backend_step(config: &BuildConfig, tool: &str) -> Step {
    let ws = &config.workspace;
    Step::new(ws.builder_bin(tool))
        .cwd(ws.builder_dir())
        .envs(&config.backend_env)
}

/// Signature repository path as handed to the backend (trailing slash).
pub(crate) fn sigs_destination(config: &BuildConfig) -> String {
    format!("{}/", config.workspace.sigs_dir().display())
}

/// `gsign` invocation recording the current signer's assertion for `release`.
pub(crate) fn assertion_step(config: &BuildConfig, release: &ReleaseDir, descriptor: &Path) -> Step {
    backend_step(config, "gsign")
        .arg("-p")
        .arg(config.signer.program.command())
        .arg("--signer")
        .arg(config.signer.key.clone())
        .arg("--release")
        .arg(release.as_str())
        .arg("--destination")
        .arg(sigs_destination(config))
        .path_arg(descriptor)
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::Path;

    use crate::config::validator::validate_options_with_env;
    use crate::config::{BuildConfig, BuildOptions, ProjectConfig};

    /// Config rooted at `workdir`, without backend inputs to download.
    pub fn config_in(workdir: &Path, adjust: impl FnOnce(&mut BuildOptions)) -> BuildConfig {
        let mut options = BuildOptions {
            build: true,
            os: "lwm".to_string(),
            jobs: 2,
            memory: 2000,
            signer: "alice".to_string(),
            version: "0.17.1".to_string(),
            ..BuildOptions::default()
        };
        adjust(&mut options);
        let project = ProjectConfig {
            inputs: Vec::new(),
            ..ProjectConfig::default()
        };
        validate_options_with_env(&options, project, workdir, |_| None)
            .expect("test options should validate")
    }

    pub fn config_for(adjust: impl FnOnce(&mut BuildOptions)) -> BuildConfig {
        config_in(Path::new("/work"), adjust)
    }
}
