//! CLI commands

pub mod fetch;
pub mod index;
pub mod serve;

use chartstreams_repo::{ChartProvider, GitChartProvider, MetadataPolicy, StreamConfig};
use clap::Args;
use std::path::PathBuf;
use tracing::info;

use crate::error::{CliError, Result};

/// Repository settings shared by every command
///
/// Precedence, lowest first: built-in defaults, the configuration file,
/// `CHART_STREAMS_*` environment variables, command-line flags.
#[derive(Args, Debug, Clone, Default)]
pub struct RepoArgs {
    /// Configuration file [default: <config dir>/chartstreams/config.yaml]
    #[arg(long, global = true, env = "CHART_STREAMS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Git repository to serve charts from (URL or local path)
    #[arg(long, global = true, env = "CHART_STREAMS_REPO_URL")]
    pub repo_url: Option<String>,

    /// Directory holding one chart per subdirectory [default: stable]
    #[arg(long, global = true, env = "CHART_STREAMS_RELATIVE_DIR")]
    pub relative_dir: Option<PathBuf>,

    /// Shallow clone depth, 0 for the full history
    #[arg(long, global = true, env = "CHART_STREAMS_CLONE_DEPTH")]
    pub clone_depth: Option<u32>,

    /// Where to clone the repository [default: a temporary directory]
    #[arg(long, global = true, env = "CHART_STREAMS_WORKING_DIR")]
    pub working_dir: Option<PathBuf>,

    /// Leave charts with an invalid Chart.yaml out of the index instead of failing
    #[arg(long, global = true, env = "CHART_STREAMS_SKIP_INVALID")]
    pub skip_invalid: bool,
}

impl RepoArgs {
    /// Resolve the effective configuration
    pub fn load_config(&self) -> Result<StreamConfig> {
        let mut config = match &self.config {
            Some(path) if !path.exists() => {
                return Err(CliError::usage_with_help(
                    format!("configuration file not found: {}", path.display()),
                    "pass an existing file to --config or drop the flag",
                ));
            }
            Some(path) => StreamConfig::load_from(path)?,
            None => StreamConfig::load()?,
        };

        if let Some(url) = &self.repo_url {
            config.repo_url = url.clone();
        }
        if let Some(dir) = &self.relative_dir {
            config.relative_dir = dir.clone();
        }
        if let Some(depth) = self.clone_depth {
            config.clone_depth = depth;
        }
        if let Some(dir) = &self.working_dir {
            config.working_dir = Some(dir.clone());
        }
        if self.skip_invalid {
            config.metadata_policy = MetadataPolicy::Skip;
        }

        Ok(config)
    }
}

/// Clone the repository and build its index
pub async fn open_provider(config: StreamConfig) -> Result<GitChartProvider> {
    if config.repo_url.trim().is_empty() {
        return Err(CliError::usage_with_help(
            "no repository to serve",
            "pass --repo-url, set CHART_STREAMS_REPO_URL or add repoUrl to the configuration file",
        ));
    }

    let provider = GitChartProvider::open(config).await?;
    provider.initialize().await?;

    let catalog = provider.index_file()?;
    info!(
        charts = catalog.names().len(),
        versions = catalog.len(),
        "repository ready"
    );
    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_flags_override_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        std::fs::write(
            &path,
            "repoUrl: /srv/git/charts\nrelativeDir: incubator\ncloneDepth: 5\n",
        )
        .unwrap();

        let args = RepoArgs {
            config: Some(path),
            relative_dir: Some(PathBuf::from("stable")),
            skip_invalid: true,
            ..Default::default()
        };
        let config = args.load_config().unwrap();

        assert_eq!(config.repo_url, "/srv/git/charts");
        assert_eq!(config.relative_dir, PathBuf::from("stable"));
        assert_eq!(config.clone_depth, 5);
        assert_eq!(config.metadata_policy, MetadataPolicy::Skip);
    }

    #[test]
    fn test_missing_config_file() {
        let args = RepoArgs {
            config: Some(PathBuf::from("/nonexistent/chartstreams.yaml")),
            ..Default::default()
        };
        let err = args.load_config().unwrap_err();
        assert_eq!(err.exit_code(), crate::exit_codes::USAGE_ERROR);
    }

    #[tokio::test]
    async fn test_open_without_repository() {
        let err = open_provider(StreamConfig::default()).await.err().unwrap();
        assert_eq!(err.exit_code(), crate::exit_codes::USAGE_ERROR);
    }
}
