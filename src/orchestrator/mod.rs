//! Release Orchestration: setup -> source -> build -> sign -> verify.
//!
//! The orchestrator owns the validated `BuildConfig`, the step runner and the
//! source control handle, runs the requested phases in their fixed order and
//! tracks progress in an `OrchestrationState`. Everything is sequential: one
//! external step at a time, first failure wins.

pub mod artifacts;
pub mod executor;
pub mod phases;
pub mod state;

use std::fs;
use std::path::Path;

pub use executor::{RecordingRunner, Step, StepOutput, StepRunner, SystemRunner};
pub use state::{OrchestrationState, RunPhase};

use crate::config::BuildConfig;
use crate::error::Result;
use crate::models::{BuildTarget, ResolvedRelease};
use crate::vcs::SourceControl;
use phases::commit::{signed_message, unsigned_message};
use phases::{PhaseReport, SetupOutcome};

/// How a run that did not fail ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    /// Setup changed host networking; rerun after rebooting
    RebootRequired,
}

/// Drop macOS from the target set when the SDK archive is not staged.
///
/// Only building and signing consume the SDK; a verify-only run keeps macOS.
pub fn drop_macos_without_sdk(config: BuildConfig) -> BuildConfig {
    let operations = config.operations;
    if !(operations.build || operations.sign) || !config.targets.contains(BuildTarget::MacOs) {
        return config;
    }
    let sdk = config.workspace.inputs_dir().join(&config.project.macos_sdk);
    if sdk.is_file() {
        return config;
    }

    log::warn!("[Orchestrator] Cannot build for MacOS, SDK does not exist. Will build for other OSes");
    let mut targets = config.targets.clone();
    targets.remove(BuildTarget::MacOs);
    config.with_targets(targets)
}

/// Drives one invocation through its phases.
pub struct Orchestrator<R, V> {
    config: BuildConfig,
    runner: R,
    vcs: V,
    state: OrchestrationState,
}

impl<R, V> Orchestrator<R, V>
where
    R: StepRunner,
    V: SourceControl,
{
    /// Create an orchestrator for a validated configuration.
    ///
    /// macOS is removed from the targets here if its SDK is missing and the
    /// run builds or signs.
    pub fn new(config: BuildConfig, runner: R, vcs: V) -> Self {
        Orchestrator {
            config: drop_macos_without_sdk(config),
            runner,
            vcs,
            state: OrchestrationState::new(),
        }
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn vcs(&self) -> &V {
        &self.vcs
    }

    pub fn state(&self) -> &OrchestrationState {
        &self.state
    }

    /// Run all requested phases.
    ///
    /// On failure the state is marked failed and the error is returned
    /// unchanged.
    pub async fn run(&mut self) -> Result<RunOutcome> {
        log::info!(
            "[Orchestrator] {} {} for {} (targets: {})",
            self.config.project.name,
            self.config.release.version,
            self.config.signer.key,
            self.config
                .targets
                .iter()
                .map(|t| t.display_name())
                .collect::<Vec<_>>()
                .join(", ")
        );

        match self.run_phases().await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                log::error!("[Orchestrator] {} failed: {}", self.state.phase, e);
                self.state.record_error(&e);
                Err(e)
            }
        }
    }

    async fn run_phases(&mut self) -> Result<RunOutcome> {
        let operations = self.config.operations;

        if operations.setup {
            self.state.transition_to(RunPhase::Setup)?;
            let outcome =
                phases::prepare_environment(&self.config, &self.runner, &self.vcs).await?;
            if outcome == SetupOutcome::RebootRequired {
                self.state.transition_to(RunPhase::RebootRequired)?;
                return Ok(RunOutcome::RebootRequired);
            }
        }

        self.state.transition_to(RunPhase::SourceResolved)?;
        let release = phases::resolve_source(&self.config, &self.vcs)?;
        self.state.release = Some(release.clone());

        if operations.build {
            self.state.transition_to(RunPhase::Building)?;
            let report = phases::run_build(&self.config, &self.runner, &release).await?;
            self.record(&report);
            self.commit(&report, &release, false)?;
        }

        if operations.sign {
            self.state.transition_to(RunPhase::Signing)?;
            let report =
                phases::run_sign(&self.config, &self.runner, &release, &self.state.artifacts)
                    .await?;
            self.record(&report);
            self.commit(&report, &release, true)?;
        }

        if operations.verify {
            self.state.transition_to(RunPhase::Verifying)?;
            phases::run_verify(&self.config, &self.runner, &release).await?;
        }

        self.state.transition_to(RunPhase::Completed)?;
        log::info!(
            "[Orchestrator] Completed in {:.1}s",
            self.state.elapsed_since_start().as_secs_f64()
        );
        Ok(RunOutcome::Completed)
    }

    fn record(&mut self, report: &PhaseReport) {
        self.state.artifacts.extend(report.artifacts.iter().cloned());
        self.state.records.extend(report.records.iter().cloned());
    }

    /// Commit the phase's records when the commit policy allows it.
    fn commit(&self, report: &PhaseReport, release: &ResolvedRelease, signed: bool) -> Result<()> {
        if !self.config.commit_files {
            log::info!("[Orchestrator] Not committing assertion records");
            return Ok(());
        }
        if report.records.is_empty() {
            return Ok(());
        }
        let signer = &self.config.signer.key;
        let message = if signed {
            signed_message(&release.version, signer)
        } else {
            unsigned_message(&release.version, signer)
        };
        phases::commit_records(&self.config, &self.vcs, &report.records, &message, signed)?;
        Ok(())
    }

    /// Write the current state as pretty JSON.
    pub fn write_summary(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.state)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        fs::write(path, json)?;
        Ok(())
    }
}
