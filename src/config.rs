//! ForkMerge configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main ForkMerge configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Git configuration
    pub git: GitSettings,

    /// Worktree layout configuration
    pub worktrees: WorktreeSettings,

    /// Merge behavior defaults
    pub merge: MergeSettings,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Call this early in startup to fail fast with clear error messages.
    pub fn validate(&self) -> Result<()> {
        if self.git.remote.is_empty() {
            return Err(eyre::eyre!("git.remote must not be empty"));
        }
        if self.worktrees.base_dir.as_os_str().is_empty() {
            return Err(eyre::eyre!("worktrees.base-dir must not be empty"));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .forkmerge.yml
        let local_config = PathBuf::from(".forkmerge.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/forkmerge/forkmerge.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("forkmerge").join("forkmerge.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Git configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitSettings {
    /// Remote used when pushing branches
    pub remote: String,
}

impl Default for GitSettings {
    fn default() -> Self {
        Self {
            remote: "origin".to_string(),
        }
    }
}

/// Worktree layout configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorktreeSettings {
    /// Parent directory for generated worktrees; relative paths are
    /// resolved against the repository root
    #[serde(rename = "base-dir")]
    pub base_dir: PathBuf,
}

impl Default for WorktreeSettings {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from(".worktrees"),
        }
    }
}

/// Merge behavior defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeSettings {
    /// Force a merge commit even when fast-forward is possible
    #[serde(rename = "no-fast-forward")]
    pub no_fast_forward: bool,

    /// Squash branches into staged changes instead of merge commits
    pub squash: bool,
}

impl Default for MergeSettings {
    fn default() -> Self {
        Self {
            no_fast_forward: true,
            squash: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.git.remote, "origin");
        assert_eq!(config.worktrees.base_dir, PathBuf::from(".worktrees"));
        assert!(config.merge.no_fast_forward);
        assert!(!config.merge.squash);
        config.validate().unwrap();
    }

    #[test]
    fn test_deserialize_config() {
        let yaml = r#"
git:
  remote: upstream

worktrees:
  base-dir: /tmp/forks

merge:
  no-fast-forward: false
  squash: true
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.git.remote, "upstream");
        assert_eq!(config.worktrees.base_dir, PathBuf::from("/tmp/forks"));
        assert!(!config.merge.no_fast_forward);
        assert!(config.merge.squash);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let yaml = r#"
worktrees:
  base-dir: forks
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        // Specified value
        assert_eq!(config.worktrees.base_dir, PathBuf::from("forks"));

        // Defaults for unspecified
        assert_eq!(config.git.remote, "origin");
        assert!(config.merge.no_fast_forward);
    }

    #[test]
    fn test_validate_rejects_empty_remote() {
        let config: Config = serde_yaml::from_str("git:\n  remote: \"\"\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fm.yml");
        fs::write(&path, "git:\n  remote: fork-remote\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.git.remote, "fork-remote");

        let missing = dir.path().join("nope.yml");
        assert!(Config::load(Some(&missing)).is_err());
    }
}
