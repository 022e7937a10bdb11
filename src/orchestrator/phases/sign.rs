//! Sign: attach detached code signatures to Windows and macOS builds.
//!
//! Linux has no signing phase and is never touched here. For each signable
//! target the unsigned archive left by the build phase is copied to the fixed
//! name the signer descriptor expects, the backend runs in signing
//! mode, the signed assertion is recorded and the signed installers are
//! moved into the binaries directory.

use std::path::PathBuf;

use crate::config::BuildConfig;
use crate::error::{ArtifactError, Result};
use crate::models::{ArtifactSet, BuildTarget, ReleaseDir, ResolvedRelease, SignatureRecord};
use crate::orchestrator::artifacts::{
    copy_file, find_matches, move_file, move_matching, pattern_to_regex,
};
use crate::orchestrator::executor::{check_call, StepRunner};
use crate::orchestrator::phases::{assertion_step, backend_step, PhaseReport};

/// Unsigned archive of `target` moved by a build phase in this run.
///
/// The backend names the archive after the package version, which differs
/// from the release label for commit and pull request builds.
fn built_unsigned_archive(
    built: &[ArtifactSet],
    target: BuildTarget,
    build_release: &ReleaseDir,
    pattern: &str,
) -> std::result::Result<Option<PathBuf>, ArtifactError> {
    let regex = pattern_to_regex(pattern)?;
    Ok(built
        .iter()
        .filter(|set| set.target == target && set.release == *build_release)
        .flat_map(|set| set.files.iter())
        .find(|file| {
            file.is_file()
                && file
                    .file_name()
                    .is_some_and(|name| regex.is_match(&name.to_string_lossy()))
        })
        .cloned())
}

/// Sign one Windows or macOS target. Returns `None` for Linux.
///
/// `built` holds the build phase's artifacts when this run built the
/// target; otherwise the archive named after the release label must already
/// be in the backend inputs.
pub async fn sign_target<R: StepRunner>(
    config: &BuildConfig,
    runner: &R,
    release: &ResolvedRelease,
    target: BuildTarget,
    built: &[ArtifactSet],
) -> Result<Option<(ArtifactSet, SignatureRecord)>> {
    let project = &config.project.name;
    let (Some(descriptor), Some(signed_release), Some(pattern), Some(versioned), Some(staged)) = (
        config.workspace.signer_descriptor(target),
        target.signed_release(&release.version),
        target.unsigned_pattern(project),
        target.versioned_unsigned_name(project, &release.version),
        target.staged_unsigned_name(project),
    ) else {
        return Ok(None);
    };
    let ws = &config.workspace;

    log::info!("[Sign] Signing {} {}", release.version, target);

    let build_release = target.build_release(&release.version);
    let unsigned = match built_unsigned_archive(built, target, &build_release, &pattern)? {
        Some(path) => path,
        None => ws.inputs_dir().join(versioned),
    };
    if !unsigned.is_file() {
        return Err(ArtifactError::UnsignedInputMissing(unsigned).into());
    }
    log::debug!("[Sign] Staging {}", unsigned.display());
    copy_file(&unsigned, &ws.inputs_dir().join(staged))?;

    let gbuild = backend_step(config, "gbuild")
        .arg("-i")
        .arg("--commit")
        .arg(format!("signature={}", release.commit))
        .path_arg(&descriptor);
    check_call(runner, gbuild).await?;

    check_call(runner, assertion_step(config, &signed_release, &descriptor)).await?;
    let record = SignatureRecord::new(signed_release.clone(), config.signer.key.clone());

    let out_dir = ws.out_dir();
    let binaries = ws.binaries_dir(&release.version);
    let mut files = Vec::new();
    for (pattern, rename) in target.signed_outputs(project, &release.version) {
        match rename {
            Some(name) => {
                let matches = find_matches(&out_dir, &pattern)?;
                let Some(source) = matches.first() else {
                    return Err(ArtifactError::NoMatch {
                        pattern,
                        dir: out_dir,
                    }
                    .into());
                };
                let dest = binaries.join(name);
                move_file(source, &dest)?;
                files.push(dest);
            }
            None => files.extend(move_matching(&out_dir, &pattern, &binaries)?),
        }
    }

    Ok(Some((
        ArtifactSet {
            target,
            release: signed_release,
            files,
        },
        record,
    )))
}

/// Run the sign phase for the selected Windows and macOS targets.
pub async fn run_sign<R: StepRunner>(
    config: &BuildConfig,
    runner: &R,
    release: &ResolvedRelease,
    built: &[ArtifactSet],
) -> Result<PhaseReport> {
    let mut report = PhaseReport::default();
    for target in config.targets.signable() {
        if let Some((artifacts, record)) =
            sign_target(config, runner, release, target, built).await?
        {
            report.artifacts.push(artifacts);
            report.records.push(record);
        }
    }
    if report.records.is_empty() {
        log::info!("[Sign] No Windows or macOS target selected, nothing to sign");
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::orchestrator::executor::{RecordingRunner, StepOutput};
    use crate::orchestrator::phases::test_support::config_in;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn release() -> ResolvedRelease {
        ResolvedRelease {
            version: "0.17.1".to_string(),
            commit: "v0.17.1".to_string(),
            url: "https://github.com/monacoinproject/monacoin".to_string(),
        }
    }

    fn signing_runner(out_dir: &Path) -> RecordingRunner {
        let out_dir = out_dir.to_path_buf();
        RecordingRunner::with_handler(move |step| {
            if step.program_name() == "gbuild" {
                fs::create_dir_all(&out_dir).unwrap();
                let descriptor = step.args.last().cloned().unwrap_or_default();
                if descriptor.ends_with("gitian-win-signer.yml") {
                    fs::write(out_dir.join("monacoin-0.17.1-win64-setup.exe"), "w64").unwrap();
                    fs::write(out_dir.join("monacoin-0.17.1-win32-setup.exe"), "w32").unwrap();
                } else {
                    fs::write(out_dir.join("monacoin-osx-signed.dmg"), "dmg").unwrap();
                }
            }
            StepOutput::success()
        })
    }

    fn stage_unsigned(config: &BuildConfig, suffix: &str) {
        let inputs = config.workspace.inputs_dir();
        fs::create_dir_all(&inputs).unwrap();
        fs::write(
            inputs.join(format!("monacoin-0.17.1-{}-unsigned.tar.gz", suffix)),
            suffix,
        )
        .unwrap();
    }

    #[tokio::test]
    async fn test_sign_windows_and_macos() {
        let dir = TempDir::new().unwrap();
        let config = config_in(dir.path(), |_| {});
        stage_unsigned(&config, "win");
        stage_unsigned(&config, "osx");
        let runner = signing_runner(&config.workspace.out_dir());

        let report = run_sign(&config, &runner, &release(), &[]).await.unwrap();

        let releases: Vec<_> = report.records.iter().map(|r| r.release.to_string()).collect();
        assert_eq!(releases, vec!["0.17.1-win-signed", "0.17.1-osx-signed"]);

        let ws = &config.workspace;
        let staged = ws.inputs_dir().join("monacoin-win-unsigned.tar.gz");
        assert_eq!(fs::read_to_string(staged).unwrap(), "win");
        let binaries = ws.binaries_dir("0.17.1");
        assert!(binaries.join("monacoin-0.17.1-win64-setup.exe").exists());
        assert!(binaries.join("monacoin-0.17.1-win32-setup.exe").exists());
        assert!(binaries.join("monacoin-0.17.1-osx.dmg").exists());

        let gbuild = &runner.steps_named("gbuild")[0];
        assert_eq!(gbuild.args[..3], ["-i", "--commit", "signature=v0.17.1"]);
    }

    #[tokio::test]
    async fn test_linux_only_selection_signs_nothing() {
        let dir = TempDir::new().unwrap();
        let config = config_in(dir.path(), |o| o.os = "l".to_string());
        let runner = RecordingRunner::new();

        let report = run_sign(&config, &runner, &release(), &[]).await.unwrap();
        assert!(report.records.is_empty());
        assert_eq!(runner.count(), 0);
        assert!(sign_target(&config, &runner, &release(), BuildTarget::Linux, &[])
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_missing_unsigned_archive() {
        let dir = TempDir::new().unwrap();
        let config = config_in(dir.path(), |o| o.os = "w".to_string());
        let runner = RecordingRunner::new();

        let err = run_sign(&config, &runner, &release(), &[]).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Artifact(ArtifactError::UnsignedInputMissing(_))
        ));
        assert_eq!(runner.count(), 0);
    }

    #[tokio::test]
    async fn test_restaging_overwrites() {
        let dir = TempDir::new().unwrap();
        let config = config_in(dir.path(), |o| o.os = "w".to_string());
        let inputs = config.workspace.inputs_dir();
        fs::create_dir_all(&inputs).unwrap();
        fs::write(inputs.join("monacoin-win-unsigned.tar.gz"), "stale").unwrap();
        stage_unsigned(&config, "win");

        let runner = signing_runner(&config.workspace.out_dir());
        run_sign(&config, &runner, &release(), &[]).await.unwrap();
        assert_eq!(
            fs::read_to_string(inputs.join("monacoin-win-unsigned.tar.gz")).unwrap(),
            "win"
        );
    }

    #[tokio::test]
    async fn test_commit_build_stages_archive_recorded_by_build() {
        let dir = TempDir::new().unwrap();
        let config = config_in(dir.path(), |o| {
            o.os = "w".to_string();
            o.commit = true;
            o.version = "feature-x".to_string();
        });
        let branch = ResolvedRelease {
            version: "feature-x".to_string(),
            commit: "feature-x".to_string(),
            url: "https://github.com/monacoinproject/monacoin".to_string(),
        };
        let inputs = config.workspace.inputs_dir();
        fs::create_dir_all(&inputs).unwrap();
        let archive = inputs.join("monacoin-0.17.99-win-unsigned.tar.gz");
        fs::write(&archive, "branch build").unwrap();
        let built = vec![ArtifactSet {
            target: BuildTarget::Windows,
            release: BuildTarget::Windows.build_release("feature-x"),
            files: vec![archive],
        }];

        let runner = signing_runner(&config.workspace.out_dir());
        let report = run_sign(&config, &runner, &branch, &built).await.unwrap();

        assert_eq!(report.records[0].release.to_string(), "feature-x-win-signed");
        assert_eq!(
            fs::read_to_string(inputs.join("monacoin-win-unsigned.tar.gz")).unwrap(),
            "branch build"
        );
    }

    #[tokio::test]
    async fn test_build_artifacts_of_other_targets_are_ignored() {
        let dir = TempDir::new().unwrap();
        let config = config_in(dir.path(), |o| o.os = "w".to_string());
        let inputs = config.workspace.inputs_dir();
        fs::create_dir_all(&inputs).unwrap();
        let osx = inputs.join("monacoin-0.17.1-osx-unsigned.tar.gz");
        fs::write(&osx, "osx").unwrap();
        let built = vec![ArtifactSet {
            target: BuildTarget::MacOs,
            release: BuildTarget::MacOs.build_release("0.17.1"),
            files: vec![osx],
        }];

        let err = run_sign(&config, &RecordingRunner::new(), &release(), &built)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::Artifact(ArtifactError::UnsignedInputMissing(_))
        ));
    }
}
