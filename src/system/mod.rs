/// System module: host package management, host release queries, paths

pub mod paths;

use crate::error::StepError;
use crate::orchestrator::executor::{check_call, Step, StepRunner};

pub use paths::Workspace;

/// Packages every isolation backend needs on the host.
pub const COMMON_PACKAGES: [&str; 5] = ["ruby", "git", "apt-cacher-ng", "make", "wget"];

/// Docker packages tried in order until one installs.
pub const DOCKER_PACKAGES: [&str; 2] = ["docker.io", "docker-ce"];

/// Defaults file of the LXC network service.
pub const LXC_NET_DEFAULTS: &str = "/etc/default/lxc-net";

/// Quiet, privileged `apt-get install` of `packages`.
pub fn apt_install_step<I, S>(packages: I) -> Step
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Step::new("sudo")
        .args(["apt-get", "install", "-qq"])
        .args(packages)
}

/// Switch the LXC network from `lxcbr0` to the `br0` bridge.
pub fn bridge_rewrite_step() -> Step {
    Step::new("sudo").args(["sed", "-i", "s/lxcbr0/br0/", LXC_NET_DEFAULTS])
}

/// Codename of the host distribution release (`lsb_release -cs`).
pub async fn host_release<R: StepRunner>(runner: &R) -> Result<String, StepError> {
    let output = check_call(runner, Step::new("lsb_release").arg("-cs")).await?;
    let codename = output.stdout.trim().to_string();
    log::debug!("[System] Host release: {}", codename);
    Ok(codename)
}
