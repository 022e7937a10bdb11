//! Core data structures: build targets, release specs, signer identities,
//! isolation backends, artifact sets and signature records.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::UsageError;

/// Target operating system of a deterministic build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildTarget {
    Linux,
    Windows,
    MacOs,
}

impl BuildTarget {
    /// All targets in execution order.
    pub const ALL: [BuildTarget; 3] = [BuildTarget::Linux, BuildTarget::Windows, BuildTarget::MacOs];

    /// Selection letter used on the command line (`l`, `w`, `m`).
    pub fn letter(&self) -> char {
        match self {
            BuildTarget::Linux => 'l',
            BuildTarget::Windows => 'w',
            BuildTarget::MacOs => 'm',
        }
    }

    /// Human readable name for log output.
    pub fn display_name(&self) -> &'static str {
        match self {
            BuildTarget::Linux => "Linux",
            BuildTarget::Windows => "Windows",
            BuildTarget::MacOs => "MacOS",
        }
    }

    /// Suffix used in release directory names and descriptor file names.
    pub fn release_suffix(&self) -> &'static str {
        match self {
            BuildTarget::Linux => "linux",
            BuildTarget::Windows => "win",
            BuildTarget::MacOs => "osx",
        }
    }

    /// Whether the target has a separate code-signing phase.
    pub fn has_sign_phase(&self) -> bool {
        !matches!(self, BuildTarget::Linux)
    }

    /// Build descriptor file name (`gitian-linux.yml`, ...).
    pub fn descriptor(&self) -> String {
        format!("gitian-{}.yml", self.release_suffix())
    }

    /// Signer descriptor file name, `None` for Linux.
    pub fn signer_descriptor(&self) -> Option<String> {
        self.has_sign_phase()
            .then(|| format!("gitian-{}-signer.yml", self.release_suffix()))
    }

    /// Release directory holding the assertion records of the build phase.
    pub fn build_release(&self, version: &str) -> ReleaseDir {
        if self.has_sign_phase() {
            ReleaseDir(format!("{}-{}-unsigned", version, self.release_suffix()))
        } else {
            ReleaseDir(format!("{}-{}", version, self.release_suffix()))
        }
    }

    /// Release directory holding the assertion records of the sign phase.
    pub fn signed_release(&self, version: &str) -> Option<ReleaseDir> {
        self.has_sign_phase()
            .then(|| ReleaseDir(format!("{}-{}-signed", version, self.release_suffix())))
    }

    /// Pattern of the unsigned archive the build phase keeps for signing.
    pub fn unsigned_pattern(&self, project: &str) -> Option<String> {
        self.has_sign_phase()
            .then(|| format!("{}-*-{}-unsigned.tar.gz", project, self.release_suffix()))
    }

    /// Unsigned archive name for a concrete version (`monacoin-0.17.1-win-unsigned.tar.gz`).
    pub fn versioned_unsigned_name(&self, project: &str, version: &str) -> Option<String> {
        self.has_sign_phase().then(|| {
            format!(
                "{}-{}-{}-unsigned.tar.gz",
                project,
                version,
                self.release_suffix()
            )
        })
    }

    /// Fixed file name the signer descriptor expects in `inputs/`.
    pub fn staged_unsigned_name(&self, project: &str) -> Option<String> {
        self.has_sign_phase()
            .then(|| format!("{}-{}-unsigned.tar.gz", project, self.release_suffix()))
    }

    /// Build outputs moved into the binaries directory, relative to `build/out`.
    pub fn output_patterns(&self, project: &str) -> Vec<String> {
        match self {
            BuildTarget::Linux => vec![
                format!("{}-*.tar.gz", project),
                format!("src/{}-*.tar.gz", project),
            ],
            BuildTarget::Windows => vec![format!("{}-*.zip", project), format!("{}-*.exe", project)],
            BuildTarget::MacOs => vec![format!("{}-*.tar.gz", project), format!("{}-*.dmg", project)],
        }
    }

    /// Signed outputs relative to `build/out`, with an optional rename.
    pub fn signed_outputs(&self, project: &str, version: &str) -> Vec<(String, Option<String>)> {
        match self {
            BuildTarget::Linux => Vec::new(),
            BuildTarget::Windows => vec![
                (format!("{}-*win64-setup.exe", project), None),
                (format!("{}-*win32-setup.exe", project), None),
            ],
            BuildTarget::MacOs => vec![(
                format!("{}-osx-signed.dmg", project),
                Some(format!("{}-{}-osx.dmg", project, version)),
            )],
        }
    }
}

impl fmt::Display for BuildTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Ordered set of requested targets.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TargetSet(BTreeSet<BuildTarget>);

impl TargetSet {
    /// Parse a selection string such as `lwm` or `w`.
    pub fn parse(selection: &str) -> Result<Self, UsageError> {
        let mut targets = BTreeSet::new();
        for ch in selection.chars() {
            let target = BuildTarget::ALL
                .iter()
                .find(|t| t.letter() == ch)
                .ok_or_else(|| UsageError::InvalidTargets(selection.to_string()))?;
            targets.insert(*target);
        }
        Ok(TargetSet(targets))
    }

    pub fn contains(&self, target: BuildTarget) -> bool {
        self.0.contains(&target)
    }

    pub fn remove(&mut self, target: BuildTarget) -> bool {
        self.0.remove(&target)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Targets in execution order (linux, windows, macos).
    pub fn iter(&self) -> impl Iterator<Item = BuildTarget> + '_ {
        self.0.iter().copied()
    }

    /// Targets that have a signing phase.
    pub fn signable(&self) -> impl Iterator<Item = BuildTarget> + '_ {
        self.iter().filter(|t| t.has_sign_phase())
    }
}

impl FromIterator<BuildTarget> for TargetSet {
    fn from_iter<I: IntoIterator<Item = BuildTarget>>(iter: I) -> Self {
        TargetSet(iter.into_iter().collect())
    }
}

/// How the version argument identifies the source revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefKind {
    /// Release tag; `v` is prepended to the version.
    Tag,
    /// Commit hash or branch name, used verbatim.
    Commit,
    /// Number of a pull request on the source hosting.
    PullRequest,
}

impl RefKind {
    /// Derive the ref kind from the two mutually exclusive modifier flags.
    pub fn from_flags(commit: bool, pull: bool) -> Result<Self, UsageError> {
        match (commit, pull) {
            (true, true) => Err(UsageError::ConflictingRefModes),
            (true, false) => Ok(RefKind::Commit),
            (false, true) => Ok(RefKind::PullRequest),
            (false, false) => Ok(RefKind::Tag),
        }
    }
}

/// Identifies one build unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseSpec {
    pub url: String,
    pub version: String,
    pub kind: RefKind,
}

impl ReleaseSpec {
    /// Revision to check out before any pull request resolution.
    pub fn initial_commit(&self) -> String {
        match self.kind {
            RefKind::Tag => format!("v{}", self.version),
            RefKind::Commit | RefKind::PullRequest => self.version.clone(),
        }
    }

    /// Remote ref of the merge commit for pull request builds.
    pub fn pull_refspec(&self) -> Option<String> {
        (self.kind == RefKind::PullRequest).then(|| format!("refs/pull/{}/merge", self.version))
    }
}

/// A release spec bound to a concrete commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedRelease {
    /// Version label used in directory and record names.
    pub version: String,
    /// Commit, branch or tag handed to the backend.
    pub commit: String,
    pub url: String,
}

/// Command used by the assertion step to sign records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignProgram {
    /// Real detached GPG signature.
    Gpg,
    /// No-op; records are signed offline later.
    Placeholder,
}

impl SignProgram {
    pub fn command(&self) -> &'static str {
        match self {
            SignProgram::Gpg => "gpg --detach-sign",
            SignProgram::Placeholder => "true",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerIdentity {
    pub key: String,
    pub program: SignProgram,
}

impl SignerIdentity {
    pub fn new(key: impl Into<String>, detach_sign: bool) -> Self {
        SignerIdentity {
            key: key.into(),
            program: if detach_sign {
                SignProgram::Placeholder
            } else {
                SignProgram::Gpg
            },
        }
    }
}

/// Sandboxing mechanism used by the build backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IsolationBackend {
    Lxc,
    Kvm,
    Docker,
}

impl IsolationBackend {
    pub fn from_flags(kvm: bool, docker: bool) -> Result<Self, UsageError> {
        match (kvm, docker) {
            (true, true) => Err(UsageError::ConflictingBackends),
            (true, false) => Ok(IsolationBackend::Kvm),
            (false, true) => Ok(IsolationBackend::Docker),
            (false, false) => Ok(IsolationBackend::Lxc),
        }
    }

    /// Host packages required in addition to the common tooling.
    pub fn packages(&self) -> &'static [&'static str] {
        match self {
            IsolationBackend::Kvm => &["python-vm-builder", "qemu-kvm", "qemu-utils"],
            IsolationBackend::Lxc => &["lxc", "debootstrap"],
            IsolationBackend::Docker => &[],
        }
    }

    /// Flag passed to `make-base-vm`.
    pub fn base_image_flag(&self) -> Option<&'static str> {
        match self {
            IsolationBackend::Docker => Some("--docker"),
            IsolationBackend::Lxc => Some("--lxc"),
            IsolationBackend::Kvm => None,
        }
    }

    /// Environment exported to every backend invocation.
    ///
    /// `lookup` reads the caller's environment so operator overrides of the
    /// LXC addresses are kept.
    pub fn environment<F>(&self, lookup: F) -> Vec<(String, String)>
    where
        F: Fn(&str) -> Option<String>,
    {
        match self {
            IsolationBackend::Docker => vec![("USE_DOCKER".to_string(), "1".to_string())],
            IsolationBackend::Kvm => Vec::new(),
            IsolationBackend::Lxc => {
                let host_ip = lookup("GITIAN_HOST_IP").unwrap_or_else(|| "10.0.3.1".to_string());
                let guest_ip = lookup("LXC_GUEST_IP").unwrap_or_else(|| "10.0.3.5".to_string());
                vec![
                    ("USE_LXC".to_string(), "1".to_string()),
                    ("GITIAN_HOST_IP".to_string(), host_ip),
                    ("LXC_GUEST_IP".to_string(), guest_ip),
                ]
            }
        }
    }
}

/// Directory name in the signature repository (`0.17.1-win-unsigned`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReleaseDir(pub String);

impl ReleaseDir {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReleaseDir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Files produced for one target by the build or sign phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactSet {
    pub target: BuildTarget,
    pub release: ReleaseDir,
    pub files: Vec<PathBuf>,
}

/// Assertion of a signer for one release directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureRecord {
    pub release: ReleaseDir,
    pub signer: String,
}

impl SignatureRecord {
    pub fn new(release: ReleaseDir, signer: impl Into<String>) -> Self {
        SignatureRecord {
            release,
            signer: signer.into(),
        }
    }

    /// Path relative to the signature repository root.
    pub fn relative_path(&self) -> PathBuf {
        Path::new(self.release.as_str()).join(&self.signer)
    }
}

/// Operations requested for one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Operations {
    pub setup: bool,
    pub build: bool,
    pub sign: bool,
    pub verify: bool,
}

impl Operations {
    /// `buildsign` implies both build and sign.
    pub fn new(setup: bool, build: bool, sign: bool, buildsign: bool, verify: bool) -> Self {
        Operations {
            setup,
            build: build || buildsign,
            sign: sign || buildsign,
            verify,
        }
    }
}
