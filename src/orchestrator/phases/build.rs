//! Build: deterministic builds and unsigned assertions.
//!
//! Before the first target, pinned backend inputs are fetched and the
//! source's dependency tarballs are downloaded into the backend cache. Each
//! target then runs `gbuild`, records the signer's assertion with `gsign` and
//! moves its outputs: Windows/macOS unsigned archives go to the backend
//! `inputs/` directory for the sign phase, everything else to the per-version
//! binaries directory.
//!
//! Targets run strictly in order and the first failure aborts the phase.
//! Outputs of targets that already finished stay where they were moved.

use std::fs;

use crate::config::BuildConfig;
use crate::error::Result;
use crate::models::{ArtifactSet, BuildTarget, ResolvedRelease, SignatureRecord};
use crate::orchestrator::artifacts::{fetch_input, move_matching};
use crate::orchestrator::executor::{check_call, Step, StepRunner};
use crate::orchestrator::phases::{assertion_step, backend_step, PhaseReport};

/// Create output directories, fetch backend inputs and pre-download
/// dependency sources.
pub async fn prepare_inputs<R: StepRunner>(
    config: &BuildConfig,
    runner: &R,
    release: &ResolvedRelease,
) -> Result<()> {
    let ws = &config.workspace;
    fs::create_dir_all(ws.binaries_dir(&release.version))?;
    fs::create_dir_all(ws.inputs_dir())?;

    if !config.project.inputs.is_empty() {
        let client = reqwest::Client::new();
        for input in &config.project.inputs {
            fetch_input(&client, input, &ws.inputs_dir()).await?;
        }
    }

    log::info!("[Build] Building dependencies");
    let download = Step::new("make")
        .arg("-C")
        .path_arg(&ws.source_dir().join("depends"))
        .arg("download")
        .arg(format!("SOURCES_PATH={}", ws.cache_sources_dir().display()))
        .cwd(ws.builder_dir());
    check_call(runner, download).await?;
    Ok(())
}

/// Build one target and collect its outputs.
pub async fn build_target<R: StepRunner>(
    config: &BuildConfig,
    runner: &R,
    release: &ResolvedRelease,
    target: BuildTarget,
) -> Result<(ArtifactSet, SignatureRecord)> {
    let ws = &config.workspace;
    let project = &config.project.name;
    let descriptor = ws.build_descriptor(target);
    let release_dir = target.build_release(&release.version);

    log::info!("[Build] Compiling {} {}", release.version, target);

    let gbuild = backend_step(config, "gbuild")
        .arg("-j")
        .arg(config.jobs.to_string())
        .arg("-m")
        .arg(config.memory.to_string())
        .arg("--commit")
        .arg(format!("{}={}", project, release.commit))
        .arg("--url")
        .arg(format!("{}={}", project, release.url))
        .path_arg(&descriptor);
    check_call(runner, gbuild).await?;

    check_call(runner, assertion_step(config, &release_dir, &descriptor)).await?;
    let record = SignatureRecord::new(release_dir.clone(), config.signer.key.clone());

    let out_dir = ws.out_dir();
    let mut files = Vec::new();

    // The unsigned archive also matches the macOS `*.tar.gz` output pattern,
    // so it has to leave build/out first.
    if let Some(pattern) = target.unsigned_pattern(project) {
        files.extend(move_matching(&out_dir, &pattern, &ws.inputs_dir())?);
    }
    let binaries = ws.binaries_dir(&release.version);
    for pattern in target.output_patterns(project) {
        files.extend(move_matching(&out_dir, &pattern, &binaries)?);
    }

    log::info!("[Build] {} done: {} files", target, files.len());
    Ok((
        ArtifactSet {
            target,
            release: release_dir,
            files,
        },
        record,
    ))
}

/// Run the build phase for every selected target.
pub async fn run_build<R: StepRunner>(
    config: &BuildConfig,
    runner: &R,
    release: &ResolvedRelease,
) -> Result<PhaseReport> {
    prepare_inputs(config, runner, release).await?;

    let mut report = PhaseReport::default();
    for target in config.targets.iter() {
        let (artifacts, record) = build_target(config, runner, release, target).await?;
        report.artifacts.push(artifacts);
        report.records.push(record);
    }
    Ok(report)
}
