//! Run State Management and Phase Tracking
//!
//! **Architecture**:
//! - `RunPhase`: the discrete phases of one invocation
//! - `OrchestrationState`: current phase plus everything the phases produced
//!   (resolved release, artifact sets, signature records)
//!
//! Phases run in a fixed order. Unrequested phases are skipped, so a
//! transition may jump forward over any number of phases, but never back.

use serde::{Deserialize, Serialize};
use std::time::SystemTime;

use crate::error::AppError;
use crate::models::{ArtifactSet, ResolvedRelease, SignatureRecord};

/// Phase of one orchestrator run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RunPhase {
    /// Options validated, nothing executed yet
    Validated,

    /// Host tooling, repositories and base image
    Setup,

    /// Release resolved to a commit and checked out
    SourceResolved,

    /// Backend builds and unsigned assertions
    Building,

    /// Code signing and signed assertions
    Signing,

    /// Assertion verification
    Verifying,

    /// Run finished successfully
    Completed,

    /// Host needs a reboot before the backend can be used; terminal
    RebootRequired,

    /// A phase failed; terminal
    Failed,
}

impl RunPhase {
    /// Get the human-readable name for this phase.
    pub fn as_str(&self) -> &'static str {
        match self {
            RunPhase::Validated => "validated",
            RunPhase::Setup => "setup",
            RunPhase::SourceResolved => "source-resolved",
            RunPhase::Building => "building",
            RunPhase::Signing => "signing",
            RunPhase::Verifying => "verifying",
            RunPhase::Completed => "completed",
            RunPhase::RebootRequired => "reboot-required",
            RunPhase::Failed => "failed",
        }
    }

    fn ordinal(&self) -> Option<u8> {
        match self {
            RunPhase::Validated => Some(0),
            RunPhase::Setup => Some(1),
            RunPhase::SourceResolved => Some(2),
            RunPhase::Building => Some(3),
            RunPhase::Signing => Some(4),
            RunPhase::Verifying => Some(5),
            RunPhase::Completed => Some(6),
            RunPhase::RebootRequired | RunPhase::Failed => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunPhase::Completed | RunPhase::RebootRequired | RunPhase::Failed
        )
    }

    /// Check if a transition to the given phase is valid.
    pub fn can_transition_to(&self, next: RunPhase) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            RunPhase::Failed => true,
            RunPhase::RebootRequired => *self == RunPhase::Setup,
            _ => match (self.ordinal(), next.ordinal()) {
                (Some(from), Some(to)) => to > from,
                _ => false,
            },
        }
    }
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Run state snapshot, also written as the run summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationState {
    pub phase: RunPhase,

    /// Release actually built, set once the source is resolved
    pub release: Option<ResolvedRelease>,

    pub artifacts: Vec<ArtifactSet>,

    /// Records produced by the assertion steps
    pub records: Vec<SignatureRecord>,

    pub start_time: SystemTime,
    pub last_update_time: SystemTime,

    /// Error message if the run failed
    pub error: Option<String>,
}

impl Default for OrchestrationState {
    fn default() -> Self {
        OrchestrationState::new()
    }
}

impl OrchestrationState {
    pub fn new() -> Self {
        let now = SystemTime::now();
        OrchestrationState {
            phase: RunPhase::Validated,
            release: None,
            artifacts: Vec::new(),
            records: Vec::new(),
            start_time: now,
            last_update_time: now,
            error: None,
        }
    }

    /// Attempt to transition to the next phase.
    pub fn transition_to(&mut self, next: RunPhase) -> Result<(), AppError> {
        if !self.phase.can_transition_to(next) {
            return Err(AppError::InvalidTransition {
                from: self.phase.as_str().to_string(),
                to: next.as_str().to_string(),
            });
        }
        log::debug!("[Orchestrator] Phase {} -> {}", self.phase, next);
        self.phase = next;
        self.last_update_time = SystemTime::now();
        Ok(())
    }

    /// Record an error and mark the run as failed.
    pub fn record_error(&mut self, error: &AppError) {
        self.error = Some(error.user_message());
        self.phase = RunPhase::Failed;
        self.last_update_time = SystemTime::now();
    }

    /// Get time elapsed since the run started.
    pub fn elapsed_since_start(&self) -> std::time::Duration {
        self.start_time.elapsed().unwrap_or_default()
    }
}
