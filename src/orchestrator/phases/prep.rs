//! Setup: host tooling, repositories and the backend base image.
//!
//! - Installs host packages for the selected isolation backend
//! - Clones the signature, detached-signature, backend and source
//!   repositories when missing
//! - Builds the base image with `make-base-vm`
//! - On LXC hosts running the bridge suite, switches the LXC network to
//!   `br0`, which only takes effect after a reboot

use crate::config::BuildConfig;
use crate::error::{EnvironmentError, Result};
use crate::models::IsolationBackend;
use crate::orchestrator::executor::{check_call, StepRunner};
use crate::orchestrator::phases::backend_step;
use crate::system::{
    apt_install_step, bridge_rewrite_step, host_release, COMMON_PACKAGES, DOCKER_PACKAGES,
};
use crate::vcs::SourceControl;

/// Result of a successful setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupOutcome {
    /// Environment is ready for builds
    Ready,
    /// Host network configuration changed; the run stops here
    RebootRequired,
}

/// Prepare the host for deterministic builds.
pub async fn prepare_environment<R, V>(
    config: &BuildConfig,
    runner: &R,
    vcs: &V,
) -> Result<SetupOutcome>
where
    R: StepRunner,
    V: SourceControl,
{
    log::info!("[Setup] Preparing {:?} build environment", config.backend);

    install_packages(config.backend, runner).await?;

    for (path, url) in config.workspace.repositories(&config.project) {
        vcs.ensure_clone(&url, &path)?;
    }

    let mut make_image = backend_step(config, "make-base-vm")
        .arg("--suite")
        .arg(config.project.suite.clone())
        .arg("--arch")
        .arg(config.project.arch.clone());
    if let Some(flag) = config.backend.base_image_flag() {
        make_image = make_image.arg(flag);
    }
    check_call(runner, make_image).await?;

    if config.backend == IsolationBackend::Lxc {
        let release = host_release(runner).await?;
        if release == config.project.bridge_suite {
            log::info!("[Setup] {} host: switching LXC network to br0", release);
            check_call(runner, bridge_rewrite_step()).await?;
            return Ok(SetupOutcome::RebootRequired);
        }
    }

    log::info!("[Setup] Environment ready");
    Ok(SetupOutcome::Ready)
}

async fn install_packages<R: StepRunner>(backend: IsolationBackend, runner: &R) -> Result<()> {
    if backend == IsolationBackend::Docker {
        let mut installed = false;
        for package in DOCKER_PACKAGES {
            let step = apt_install_step([package]);
            log::info!("[Setup] $ {}", step);
            if runner.run(&step).await?.is_success() {
                installed = true;
                break;
            }
            log::warn!("[Setup] Could not install {}", package);
        }
        if !installed {
            return Err(EnvironmentError::DockerUnavailable.into());
        }
    }

    let packages = COMMON_PACKAGES
        .iter()
        .chain(backend.packages())
        .copied();
    let step = apt_install_step(packages);
    log::info!("[Setup] $ {}", step);
    let output = runner.run(&step).await?;
    if !output.is_success() {
        return Err(EnvironmentError::PackageInstallFailed(format!(
            "'{}' exited with {:?}: {}",
            step,
            output.code,
            output.stderr.trim()
        ))
        .into());
    }
    Ok(())
}
