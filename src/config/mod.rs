//! Configuration module for release builds.
//!
//! Two layers of configuration flow into every phase:
//!
//! - `ProjectConfig`: what is being built (project name, repository URLs and
//!   directory names, base image suite, backend inputs). Loaded from TOML by
//!   `loader`, with built-in defaults for the monacoin project.
//! - `BuildConfig`: one invocation (operations, targets, signer, release spec,
//!   isolation backend). Produced by `validator` from raw `BuildOptions` and
//!   never mutated afterwards.
//!
//! # Configuration Flow
//!
//! 1. The CLI collects raw `BuildOptions`
//! 2. `loader` resolves the `ProjectConfig`
//! 3. `validator` rejects missing or conflicting options before any side effect
//! 4. The resulting `BuildConfig` is passed by reference to each phase

pub mod loader;
pub mod validator;

use serde::{Deserialize, Serialize};

use crate::models::{IsolationBackend, Operations, ReleaseSpec, SignerIdentity, TargetSet};
use crate::system::paths::Workspace;

/// A file the backend needs in its `inputs/` directory, pinned by hash.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendInput {
    pub url: String,
    pub sha256: String,
    /// File name under `inputs/`; defaults to the last URL segment.
    #[serde(default)]
    pub file_name: Option<String>,
}

impl BackendInput {
    pub fn file_name(&self) -> &str {
        match &self.file_name {
            Some(name) => name,
            None => self.url.rsplit('/').next().unwrap_or(&self.url),
        }
    }
}

/// Project description: repositories, directory names and backend inputs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Project name used in artifact names and `--commit`/`--url` keys.
    pub name: String,
    /// Default source repository URL.
    pub source_url: String,
    pub sigs_url: String,
    pub detached_sigs_url: String,
    pub builder_url: String,
    pub sigs_dir: String,
    pub detached_sigs_dir: String,
    pub builder_dir: String,
    pub source_dir: String,
    /// Base image suite and architecture for `make-base-vm`.
    pub suite: String,
    pub arch: String,
    /// Host release whose LXC network needs the `br0` bridge.
    pub bridge_suite: String,
    /// macOS SDK archive that must be present in `inputs/` for macOS builds.
    pub macos_sdk: String,
    /// Descriptor directory relative to the source clone.
    pub descriptor_dir: String,
    pub inputs: Vec<BackendInput>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        ProjectConfig {
            name: "monacoin".to_string(),
            source_url: "https://github.com/monacoinproject/monacoin".to_string(),
            sigs_url: "https://github.com/monacoinproject/gitian.sigs.ltc.git".to_string(),
            detached_sigs_url: "https://github.com/monacoinproject/monacoin-detached-sigs.git"
                .to_string(),
            builder_url: "https://github.com/devrandom/gitian-builder.git".to_string(),
            sigs_dir: "gitian.sigs.ltc".to_string(),
            detached_sigs_dir: "monacoin-detached-sigs".to_string(),
            builder_dir: "gitian-builder".to_string(),
            source_dir: "monacoin".to_string(),
            suite: "bionic".to_string(),
            arch: "amd64".to_string(),
            bridge_suite: "bionic".to_string(),
            macos_sdk: "MacOSX10.11.sdk.tar.gz".to_string(),
            descriptor_dir: "contrib/gitian-descriptors".to_string(),
            inputs: vec![
                BackendInput {
                    url: "https://downloads.sourceforge.net/project/osslsigncode/osslsigncode/osslsigncode-1.7.1.tar.gz".to_string(),
                    sha256: "f9a8cdb38b9c309326764ebc937cba1523a3a751a7ab05df3ecc99d18ae466c9".to_string(),
                    file_name: None,
                },
                BackendInput {
                    url: "https://bitcoincore.org/cfields/osslsigncode-Backports-to-1.7.1.patch".to_string(),
                    sha256: "a8c4e9cafba922f89de0df1f2152e7be286aba73f78505169bc351a7938dd911".to_string(),
                    file_name: None,
                },
            ],
        }
    }
}

/// Raw invocation options as collected by the command line.
///
/// Nothing here is validated; see [`validator::validate_options`].
#[derive(Clone, Debug, Default)]
pub struct BuildOptions {
    pub setup: bool,
    pub build: bool,
    pub sign: bool,
    pub buildsign: bool,
    pub verify: bool,
    pub commit: bool,
    pub pull: bool,
    pub url: Option<String>,
    pub os: String,
    pub jobs: u32,
    pub memory: u32,
    pub kvm: bool,
    pub docker: bool,
    pub detach_sign: bool,
    pub no_commit: bool,
    pub commit_files: bool,
    pub signer: String,
    pub version: String,
}

/// Immutable configuration of one orchestrator invocation.
#[derive(Clone, Debug)]
pub struct BuildConfig {
    pub operations: Operations,
    pub targets: TargetSet,
    pub backend: IsolationBackend,
    pub release: ReleaseSpec,
    pub signer: SignerIdentity,
    pub jobs: u32,
    pub memory: u32,
    /// Whether assertion records are committed to the signature repository.
    pub commit_files: bool,
    pub project: ProjectConfig,
    pub workspace: Workspace,
    /// Environment exported to backend invocations.
    pub backend_env: Vec<(String, String)>,
}

impl BuildConfig {
    /// Copy of this configuration with a different target set.
    pub fn with_targets(&self, targets: TargetSet) -> Self {
        BuildConfig {
            targets,
            ..self.clone()
        }
    }
}
