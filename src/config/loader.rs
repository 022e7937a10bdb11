//! Project config file loader.

use crate::config::ProjectConfig;
use crate::error::ConfigError;
use std::fs;
use std::path::{Path, PathBuf};

/// Config file name looked up in the working directory.
pub const WORKDIR_CONFIG_NAME: &str = "gitian-build.toml";

/// Get the per-user config path: ~/.config/gitian-build/config.toml
pub fn get_user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("gitian-build").join("config.toml"))
}

/// Load a project config from a TOML file.
///
/// Missing keys fall back to the built-in defaults.
pub fn load_project_config(path: &Path) -> Result<ProjectConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ConfigError::FileNotFound(path.display().to_string())
        } else {
            ConfigError::IoError(e)
        }
    })?;

    let config: ProjectConfig = toml::from_str(&content)?;
    validate_project_config(&config)?;
    Ok(config)
}

/// Find the project config file for an invocation.
///
/// Lookup order: explicit path (returned even if missing, so loading
/// reports it), `<workdir>/gitian-build.toml`, the per-user config file.
/// `None` means the built-in defaults apply.
pub fn locate_project_config(explicit: Option<&Path>, workdir: &Path) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    std::iter::once(workdir.join(WORKDIR_CONFIG_NAME))
        .chain(get_user_config_path())
        .find(|candidate| candidate.is_file())
}

/// Load the located config file, or the built-in defaults without one.
pub fn resolve_project_config(source: Option<&Path>) -> Result<ProjectConfig, ConfigError> {
    match source {
        Some(path) => load_project_config(path),
        None => Ok(ProjectConfig::default()),
    }
}

/// Reject configs that would produce unusable paths or commands.
pub fn validate_project_config(config: &ProjectConfig) -> Result<(), ConfigError> {
    let required = [
        ("name", &config.name),
        ("sigs_dir", &config.sigs_dir),
        ("detached_sigs_dir", &config.detached_sigs_dir),
        ("builder_dir", &config.builder_dir),
        ("source_dir", &config.source_dir),
        ("suite", &config.suite),
        ("arch", &config.arch),
    ];
    for (key, value) in required {
        if value.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(format!("'{}' cannot be empty", key)));
        }
    }

    for dir in [
        &config.sigs_dir,
        &config.detached_sigs_dir,
        &config.builder_dir,
        &config.source_dir,
    ] {
        if Path::new(dir).is_absolute() || dir.contains("..") {
            return Err(ConfigError::ValidationFailed(format!(
                "repository directory '{}' must be a plain name relative to the working directory",
                dir
            )));
        }
    }

    for input in &config.inputs {
        let hash = input.sha256.trim();
        if hash.len() != 64 || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ConfigError::ValidationFailed(format!(
                "input '{}' has an invalid sha256 '{}'",
                input.url, input.sha256
            )));
        }
    }

    Ok(())
}
