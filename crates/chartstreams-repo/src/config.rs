//! Server configuration
//!
//! Read from `~/.config/chartstreams/config.yaml` (or an explicit path);
//! command-line flags and `CHART_STREAMS_*` variables override it.

use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use crate::error::{RepoError, Result};

/// Configuration for a Git-backed chart repository
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamConfig {
    /// Git repository to clone (remote URL or local path)
    #[serde(default)]
    pub repo_url: String,

    /// Shallow clone depth, 0 clones the full history
    #[serde(default)]
    pub clone_depth: u32,

    /// Directory, relative to the repository root, holding one chart per subdirectory
    #[serde(default = "default_relative_dir")]
    pub relative_dir: PathBuf,

    /// Where to keep the clone; a temporary directory when unset
    #[serde(default)]
    pub working_dir: Option<PathBuf>,

    /// What to do with a Chart.yaml that fails to parse during indexing
    #[serde(default)]
    pub metadata_policy: MetadataPolicy,

    /// Upper bound for a single chart materialization
    #[serde(default = "default_materialize_timeout", with = "humantime_serde")]
    pub materialize_timeout: Duration,

    /// Prefix of the download paths published in the index
    #[serde(default)]
    pub url_prefix: String,

    /// Address the HTTP server listens on
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
}

fn default_relative_dir() -> PathBuf {
    PathBuf::from("stable")
}

fn default_materialize_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_listen_addr() -> String {
    "127.0.0.1:8080".to_string()
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            repo_url: String::new(),
            clone_depth: 0,
            relative_dir: default_relative_dir(),
            working_dir: None,
            metadata_policy: MetadataPolicy::default(),
            materialize_timeout: default_materialize_timeout(),
            url_prefix: String::new(),
            listen_addr: default_listen_addr(),
        }
    }
}

impl StreamConfig {
    /// Create a configuration for a repository with every other setting at its default
    pub fn new(repo_url: impl Into<String>) -> Self {
        Self {
            repo_url: repo_url.into(),
            ..Self::default()
        }
    }

    /// Load configuration from default location
    pub fn load() -> Result<Self> {
        let path = Self::default_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get default configuration path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| RepoError::InvalidConfig {
            message: "Could not determine config directory".to_string(),
        })?;
        Ok(config_dir.join("chartstreams").join("config.yaml"))
    }

    /// Check the settings needed before cloning
    pub fn validate(&self) -> Result<()> {
        if self.repo_url.trim().is_empty() {
            return Err(RepoError::InvalidConfig {
                message: "repoUrl is required".to_string(),
            });
        }
        let escapes_root = self
            .relative_dir
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes_root {
            return Err(RepoError::InvalidConfig {
                message: format!(
                    "relativeDir must be a path inside the repository: {}",
                    self.relative_dir.display()
                ),
            });
        }
        if self.materialize_timeout.is_zero() {
            return Err(RepoError::InvalidConfig {
                message: "materializeTimeout must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Handling of malformed chart metadata found while indexing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetadataPolicy {
    /// Abort the index build (default)
    #[default]
    Strict,
    /// Log a warning and leave the chart out of the index
    Skip,
}
