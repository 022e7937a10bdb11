//! Verify: check recorded assertions with `gverify`.

use crate::config::BuildConfig;
use crate::error::Result;
use crate::models::{ReleaseDir, ResolvedRelease};
use crate::orchestrator::executor::{check_call, StepRunner};
use crate::orchestrator::phases::{backend_step, sigs_destination};

/// Verify the unsigned release of every selected target and, for Windows
/// and macOS, the signed release. Returns the verified release directories.
pub async fn run_verify<R: StepRunner>(
    config: &BuildConfig,
    runner: &R,
    release: &ResolvedRelease,
) -> Result<Vec<ReleaseDir>> {
    let ws = &config.workspace;
    let mut verified = Vec::new();

    for target in config.targets.iter() {
        let mut checks = vec![(target.build_release(&release.version), ws.build_descriptor(target))];
        if let (Some(signed), Some(descriptor)) = (
            target.signed_release(&release.version),
            ws.signer_descriptor(target),
        ) {
            checks.push((signed, descriptor));
        }

        for (release_dir, descriptor) in checks {
            log::info!("[Verify] Verifying {}", release_dir);
            let step = backend_step(config, "gverify")
                .arg("-v")
                .arg("-d")
                .arg(sigs_destination(config))
                .arg("-r")
                .arg(release_dir.as_str())
                .path_arg(&descriptor);
            check_call(runner, step).await?;
            verified.push(release_dir);
        }
    }

    Ok(verified)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::executor::{RecordingRunner, StepOutput};
    use crate::orchestrator::phases::test_support::config_for;

    fn release() -> ResolvedRelease {
        ResolvedRelease {
            version: "0.17.1".to_string(),
            commit: "v0.17.1".to_string(),
            url: String::new(),
        }
    }

    #[tokio::test]
    async fn test_verifies_all_five_releases() {
        let config = config_for(|_| {});
        let runner = RecordingRunner::new();
        let verified = run_verify(&config, &runner, &release()).await.unwrap();

        let names: Vec<_> = verified.iter().map(|r| r.to_string()).collect();
        assert_eq!(
            names,
            vec![
                "0.17.1-linux",
                "0.17.1-win-unsigned",
                "0.17.1-win-signed",
                "0.17.1-osx-unsigned",
                "0.17.1-osx-signed",
            ]
        );
        let first = &runner.steps()[0];
        assert_eq!(first.args[..5], ["-v", "-d", "/work/gitian.sigs.ltc/", "-r", "0.17.1-linux"]);
        assert!(runner.steps()[2].args.last().unwrap().ends_with("gitian-win-signer.yml"));
    }

    #[tokio::test]
    async fn test_only_selected_targets() {
        let config = config_for(|o| o.os = "l".to_string());
        let runner = RecordingRunner::new();
        let verified = run_verify(&config, &runner, &release()).await.unwrap();
        assert_eq!(verified, vec![ReleaseDir("0.17.1-linux".to_string())]);
    }

    #[tokio::test]
    async fn test_first_failure_aborts() {
        let config = config_for(|_| {});
        let runner = RecordingRunner::with_handler(|step| {
            if step.has_arg("0.17.1-win-unsigned") {
                StepOutput::failure(1, "signature mismatch")
            } else {
                StepOutput::success()
            }
        });
        assert!(run_verify(&config, &runner, &release()).await.is_err());
        assert_eq!(runner.count(), 2);
    }
}
