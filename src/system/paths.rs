/// Centralized Path Registry for the release working directory
///
/// Every phase receives its paths from a `Workspace` instead of changing the
/// process working directory. All paths are absolute once the working
/// directory is absolute, so steps can run with any `cwd`.
///
/// Layout (default project):
///
/// ```text
/// <workdir>/
///   gitian.sigs.ltc/           signature repository
///   monacoin-detached-sigs/    detached signature repository
///   gitian-builder/            build backend
///     inputs/                  staging shared by build and sign
///     build/out/               backend output
///     cache/common/            dependency sources
///   monacoin/                  source repository
///   monacoin-binaries/<ver>/   collected artifacts
/// ```
use std::path::{Path, PathBuf};

use crate::config::ProjectConfig;
use crate::models::{BuildTarget, SignatureRecord};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Workspace {
    workdir: PathBuf,
    sigs_dir: PathBuf,
    detached_sigs_dir: PathBuf,
    builder_dir: PathBuf,
    source_dir: PathBuf,
    descriptor_dir: PathBuf,
    binaries_root: PathBuf,
}

impl Workspace {
    /// Create the registry for a working directory and project.
    ///
    /// Does not touch the filesystem.
    pub fn new(workdir: &Path, project: &ProjectConfig) -> Self {
        let source_dir = workdir.join(&project.source_dir);
        Workspace {
            workdir: workdir.to_path_buf(),
            sigs_dir: workdir.join(&project.sigs_dir),
            detached_sigs_dir: workdir.join(&project.detached_sigs_dir),
            builder_dir: workdir.join(&project.builder_dir),
            descriptor_dir: source_dir.join(&project.descriptor_dir),
            source_dir,
            binaries_root: workdir.join(format!("{}-binaries", project.name)),
        }
    }

    pub fn sigs_dir(&self) -> &Path {
        &self.sigs_dir
    }

    pub fn builder_dir(&self) -> &Path {
        &self.builder_dir
    }

    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    /// Backend executable such as `gbuild` or `make-base-vm`.
    pub fn builder_bin(&self, name: &str) -> PathBuf {
        self.builder_dir.join("bin").join(name)
    }

    /// Staging area read by the sign phase and written by the build phase.
    pub fn inputs_dir(&self) -> PathBuf {
        self.builder_dir.join("inputs")
    }

    /// Backend output directory.
    pub fn out_dir(&self) -> PathBuf {
        self.builder_dir.join("build").join("out")
    }

    /// Dependency source cache handed to `make download`.
    pub fn cache_sources_dir(&self) -> PathBuf {
        self.builder_dir.join("cache").join("common")
    }

    /// The backend's own clone of the source repository.
    pub fn builder_source_cache(&self, project: &ProjectConfig) -> PathBuf {
        self.inputs_dir().join(&project.name)
    }

    /// Per-version output directory for collected artifacts.
    pub fn binaries_dir(&self, version: &str) -> PathBuf {
        self.binaries_root.join(version)
    }

    pub fn descriptor(&self, file_name: &str) -> PathBuf {
        self.descriptor_dir.join(file_name)
    }

    pub fn build_descriptor(&self, target: BuildTarget) -> PathBuf {
        self.descriptor(&target.descriptor())
    }

    pub fn signer_descriptor(&self, target: BuildTarget) -> Option<PathBuf> {
        target.signer_descriptor().map(|name| self.descriptor(&name))
    }

    /// Absolute path of an assertion record in the signature repository.
    pub fn record_path(&self, record: &SignatureRecord) -> PathBuf {
        self.sigs_dir.join(record.relative_path())
    }

    /// Session log directory.
    pub fn logs_dir(&self) -> PathBuf {
        self.workdir.join("logs")
    }

    /// Repositories cloned by the setup phase: (local path, url).
    pub fn repositories(&self, project: &ProjectConfig) -> Vec<(PathBuf, String)> {
        vec![
            (self.sigs_dir.clone(), project.sigs_url.clone()),
            (self.detached_sigs_dir.clone(), project.detached_sigs_url.clone()),
            (self.builder_dir.clone(), project.builder_url.clone()),
            (self.source_dir.clone(), project.source_url.clone()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ReleaseDir;

    #[test]
    fn test_default_layout() {
        let project = ProjectConfig::default();
        let ws = Workspace::new(Path::new("/work"), &project);

        assert_eq!(ws.sigs_dir(), Path::new("/work/gitian.sigs.ltc"));
        assert_eq!(ws.builder_bin("gbuild"), PathBuf::from("/work/gitian-builder/bin/gbuild"));
        assert_eq!(ws.inputs_dir(), PathBuf::from("/work/gitian-builder/inputs"));
        assert_eq!(ws.out_dir(), PathBuf::from("/work/gitian-builder/build/out"));
        assert_eq!(
            ws.binaries_dir("0.17.1"),
            PathBuf::from("/work/monacoin-binaries/0.17.1")
        );
        assert_eq!(
            ws.builder_source_cache(&project),
            PathBuf::from("/work/gitian-builder/inputs/monacoin")
        );
    }

    #[test]
    fn test_descriptor_paths() {
        let ws = Workspace::new(Path::new("/work"), &ProjectConfig::default());
        assert_eq!(
            ws.build_descriptor(BuildTarget::Windows),
            PathBuf::from("/work/monacoin/contrib/gitian-descriptors/gitian-win.yml")
        );
        assert_eq!(
            ws.signer_descriptor(BuildTarget::MacOs),
            Some(PathBuf::from(
                "/work/monacoin/contrib/gitian-descriptors/gitian-osx-signer.yml"
            ))
        );
        assert!(ws.signer_descriptor(BuildTarget::Linux).is_none());
    }

    #[test]
    fn test_record_path() {
        let ws = Workspace::new(Path::new("/work"), &ProjectConfig::default());
        let record = SignatureRecord::new(ReleaseDir("1.0-linux".to_string()), "bob");
        assert_eq!(
            ws.record_path(&record),
            PathBuf::from("/work/gitian.sigs.ltc/1.0-linux/bob")
        );
    }

    #[test]
    fn test_repository_order() {
        let project = ProjectConfig::default();
        let ws = Workspace::new(Path::new("/work"), &project);
        let repos = ws.repositories(&project);
        assert_eq!(repos.len(), 4);
        assert_eq!(repos[0].0, PathBuf::from("/work/gitian.sigs.ltc"));
        assert_eq!(repos[3].1, project.source_url);
    }
}
