//! gitian-build: deterministic release build orchestration
//!
//! Drives a gitian build backend (`gbuild`, `gsign`, `gverify`,
//! `make-base-vm`) to produce Linux, Windows and macOS release artifacts,
//! records signer assertions in a signature repository and verifies them.
//!
//! The system is organized into functional modules:
//! - **error**: Unified error type hierarchy
//! - **models**: Targets, release specs, signers, backends, records
//! - **config**: Project config files and invocation validation
//! - **system**: Host helpers and the working directory path registry
//! - **vcs**: Git access behind a `SourceControl` seam
//! - **orchestrator**: Step execution, phases and run state
//! - **log_collector**: stderr plus per-session log file
//! - **cli**: Command line parsing

// Core foundational modules
pub mod error;
pub mod models;

pub mod config;
pub mod system;
pub mod vcs;

pub mod orchestrator;

pub mod log_collector;

pub mod cli;

// Re-export the log crate for macro usage
pub use log;

pub use log_collector::{LogCollector, LogLine};

// ============================================================================
// PUBLIC RE-EXPORTS FOR CONVENIENCE
// ============================================================================

pub use error::{
    AppError, ArtifactError, ConfigError, EnvironmentError, Result, StepError, UsageError,
};

pub use models::{
    ArtifactSet, BuildTarget, IsolationBackend, Operations, RefKind, ReleaseDir, ReleaseSpec,
    ResolvedRelease, SignProgram, SignatureRecord, SignerIdentity, TargetSet,
};

pub use config::{BuildConfig, BuildOptions, ProjectConfig};

pub use orchestrator::{
    OrchestrationState, Orchestrator, RecordingRunner, RunOutcome, RunPhase, Step, StepOutput,
    StepRunner, SystemRunner,
};

pub use vcs::{NativeGit, RecordingVcs, SourceControl};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_constant() {
        assert_eq!(VERSION, "0.1.0");
    }

    #[test]
    fn test_error_reexport() {
        let _: Result<i32> = Ok(42);
    }
}
