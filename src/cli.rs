//! Command line interface.

use clap::Parser;
use log::LevelFilter;
use std::path::PathBuf;

use crate::config::BuildOptions;

/// Deterministic multi-platform build, sign and verify orchestration.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "gitian-build",
    disable_version_flag = true,
    override_usage = "gitian-build [options] <SIGNER> <VERSION>"
)]
pub struct Cli {
    /// Indicate that the version argument is for a commit or branch
    #[arg(short = 'c', long)]
    pub commit: bool,

    /// Indicate that the version argument is the number of a github repository pull request
    #[arg(short = 'p', long)]
    pub pull: bool,

    /// Specify the URL of the repository [default: project source URL]
    #[arg(short = 'u', long)]
    pub url: Option<String>,

    /// Verify the Gitian build
    #[arg(short = 'v', long)]
    pub verify: bool,

    /// Do a Gitian build
    #[arg(short = 'b', long)]
    pub build: bool,

    /// Make signed binaries for Windows and MacOS
    #[arg(short = 's', long)]
    pub sign: bool,

    /// Build both signed and unsigned binaries
    #[arg(short = 'B', long)]
    pub buildsign: bool,

    /// Operating systems to build for: l for Linux, w for Windows, m for MacOS
    #[arg(short = 'o', long, default_value = "lwm")]
    pub os: String,

    /// Number of processes to use
    #[arg(short = 'j', long, default_value_t = 2)]
    pub jobs: u32,

    /// Memory to allocate in MiB
    #[arg(short = 'm', long, default_value_t = 2000)]
    pub memory: u32,

    /// Use KVM instead of LXC
    #[arg(short = 'k', long)]
    pub kvm: bool,

    /// Use Docker instead of LXC
    #[arg(short = 'd', long)]
    pub docker: bool,

    /// Set up the Gitian building environment (Debian-based hosts only)
    #[arg(short = 'S', long)]
    pub setup: bool,

    /// Create the assert file for detached signing. Will not commit anything
    /// unless --commit-files is given.
    #[arg(short = 'D', long)]
    pub detach_sign: bool,

    /// Do not commit anything to git
    #[arg(short = 'n', long)]
    pub no_commit: bool,

    /// Commit assertion records even in detach-sign mode
    #[arg(long)]
    pub commit_files: bool,

    /// Project config file [default: <workdir>/gitian-build.toml, then ~/.config/gitian-build/config.toml]
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Directory holding the repositories [default: current directory]
    #[arg(long, value_name = "PATH")]
    pub workdir: Option<PathBuf>,

    /// Log level for stderr and the session log
    #[arg(long, default_value = "info")]
    pub log_level: LevelFilter,

    /// GPG signer to sign each build assert file
    pub signer: String,

    /// Version number, commit, or branch to build. If building a commit or
    /// branch, the -c option must be specified
    pub version: String,
}

impl Cli {
    /// Raw options for validation.
    pub fn to_options(&self) -> BuildOptions {
        BuildOptions {
            setup: self.setup,
            build: self.build,
            sign: self.sign,
            buildsign: self.buildsign,
            verify: self.verify,
            commit: self.commit,
            pull: self.pull,
            url: self.url.clone(),
            os: self.os.clone(),
            jobs: self.jobs,
            memory: self.memory,
            kvm: self.kvm,
            docker: self.docker,
            detach_sign: self.detach_sign,
            no_commit: self.no_commit,
            commit_files: self.commit_files,
            signer: self.signer.clone(),
            version: self.version.clone(),
        }
    }
}
