//! Unified error type hierarchy for the gitian build orchestrator
//!
//! Provides structured error handling with UsageError, ConfigError,
//! EnvironmentError, StepError, ArtifactError and the aggregating AppError.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::vcs::git::GitError;

/// Invocation errors detected before any external action is taken.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UsageError {
    #[error("Missing signer.")]
    MissingSigner,

    #[error("Missing version.")]
    MissingVersion,

    #[error("Cannot have both commit and pull")]
    ConflictingRefModes,

    #[error("Error: cannot have both kvm and docker")]
    ConflictingBackends,

    #[error("Invalid operating system selection '{0}': expected letters from 'lwm'")]
    InvalidTargets(String),

    #[error("Invalid pull request number: {0}")]
    InvalidPullRequest(String),
}

impl UsageError {
    /// Whether the error is a missing required argument (as opposed to a conflict).
    pub fn is_missing_argument(&self) -> bool {
        matches!(self, UsageError::MissingSigner | UsageError::MissingVersion)
    }
}

/// Project configuration loading and validation errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Invalid TOML in config: {0}")]
    InvalidToml(#[from] toml::de::Error),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    #[error("IO error during config operations: {0}")]
    IoError(#[from] io::Error),
}

/// Host preparation errors (packages, tooling, network inputs).
#[derive(Error, Debug)]
pub enum EnvironmentError {
    #[error("Package installation failed: {0}")]
    PackageInstallFailed(String),

    #[error("Cannot find any way to install docker")]
    DockerUnavailable,

    #[error("Download of {url} failed: {reason}")]
    DownloadFailed { url: String, reason: String },

    #[error("Checksum mismatch for {}: expected {expected}, got {actual}", .path.display())]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("IO error during environment preparation: {0}")]
    IoError(#[from] io::Error),
}

/// Failure of a single external invocation.
#[derive(Error, Debug)]
pub enum StepError {
    #[error("Failed to spawn '{cmd}': {source}")]
    Spawn {
        cmd: String,
        #[source]
        source: io::Error,
    },

    #[error("Command '{cmd}' failed with {}", describe_code(.code))]
    Failed {
        cmd: String,
        code: Option<i32>,
        stderr: String,
    },
}

fn describe_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit status {}", code),
        None => "no exit status (terminated by signal)".to_string(),
    }
}

impl StepError {
    /// Exit code of the failed tool, if it produced one.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            StepError::Failed { code, .. } => *code,
            StepError::Spawn { .. } => None,
        }
    }
}

/// Artifact staging errors (moving, copying, pattern matching).
#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("No artifacts matching '{pattern}' in {}", .dir.display())]
    NoMatch { pattern: String, dir: PathBuf },

    #[error("Unsigned input missing for signing: {}", .0.display())]
    UnsignedInputMissing(PathBuf),

    #[error("Invalid artifact pattern '{0}'")]
    InvalidPattern(String),

    #[error("Failed to stage {} -> {}: {source}", .from.display(), .to.display())]
    Stage {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("IO error during artifact handling: {0}")]
    IoError(#[from] io::Error),
}

/// Global error type for all orchestrator phases.
///
/// Every phase returns `Result<T, AppError>`; the binary maps it to a process
/// exit status with [`AppError::exit_code`].
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Usage(#[from] UsageError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Environment(#[from] EnvironmentError),

    #[error(transparent)]
    Step(#[from] StepError),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error(transparent)]
    Git(#[from] GitError),

    #[error("Invalid phase transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },
}

impl AppError {
    /// Process exit status for this error.
    ///
    /// Failed external tools propagate their own exit status; everything else
    /// exits with 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::Step(step) => match step.exit_code() {
                Some(code) if code != 0 => code,
                _ => 1,
            },
            _ => 1,
        }
    }

    /// Get a user-facing error message suitable for terminal output
    pub fn user_message(&self) -> String {
        match self {
            AppError::Usage(e) => format!("{}", e),
            AppError::Config(e) => format!("Configuration error: {}", e),
            AppError::Environment(e) => format!("Environment preparation failed: {}", e),
            AppError::Step(StepError::Failed { cmd, code, stderr }) => {
                let tail = stderr.lines().last().unwrap_or("").trim();
                if tail.is_empty() {
                    format!("'{}' failed with {}", cmd, describe_code(code))
                } else {
                    format!("'{}' failed with {}: {}", cmd, describe_code(code), tail)
                }
            }
            AppError::Step(e) => format!("{}", e),
            AppError::Artifact(e) => format!("Artifact handling failed: {}", e),
            AppError::Git(e) => format!("Git operation failed: {}", e),
            AppError::InvalidTransition { .. } => format!("Internal error: {}", self),
        }
    }
}

impl From<io::Error> for AppError {
    fn from(e: io::Error) -> Self {
        AppError::Artifact(ArtifactError::IoError(e))
    }
}

/// Top-level result type for orchestrator operations.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_error_display() {
        assert_eq!(UsageError::MissingSigner.to_string(), "Missing signer.");
        assert_eq!(
            UsageError::ConflictingRefModes.to_string(),
            "Cannot have both commit and pull"
        );
    }

    #[test]
    fn test_step_failure_propagates_exit_code() {
        let err: AppError = StepError::Failed {
            cmd: "bin/gbuild".to_string(),
            code: Some(42),
            stderr: String::new(),
        }
        .into();
        assert_eq!(err.exit_code(), 42);
    }

    #[test]
    fn test_signal_termination_exits_one() {
        let err: AppError = StepError::Failed {
            cmd: "bin/gbuild".to_string(),
            code: None,
            stderr: "killed".to_string(),
        }
        .into();
        assert_eq!(err.exit_code(), 1);
        assert!(err.user_message().contains("killed"));
    }

    #[test]
    fn test_usage_error_exits_one() {
        let err: AppError = UsageError::MissingVersion.into();
        assert_eq!(err.exit_code(), 1);
        assert!(UsageError::MissingVersion.is_missing_argument());
        assert!(!UsageError::ConflictingBackends.is_missing_argument());
    }
}
