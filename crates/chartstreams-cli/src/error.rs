//! CLI error types with exit code handling
//!
//! This module provides a unified error type for CLI operations that
//! maps errors to appropriate exit codes.

use chartstreams_repo::RepoError;
use miette::Diagnostic;
use thiserror::Error;

use crate::exit_codes;

/// CLI-specific error type that includes exit code information
#[derive(Error, Debug, Diagnostic, Clone)]
pub enum CliError {
    /// Clone, history walk or checkout failed
    #[error("Repository error: {message}")]
    #[diagnostic(code(chartstreams::cli::repository))]
    Repository {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Malformed chart metadata or unknown chart version
    #[error("Chart error: {message}")]
    #[diagnostic(code(chartstreams::cli::chart))]
    Chart {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Invalid arguments or configuration
    #[error("Usage error: {message}")]
    #[diagnostic(code(chartstreams::cli::usage))]
    Usage {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// IO error (file not found, permissions, etc.)
    #[error("IO error: {message}")]
    #[diagnostic(code(chartstreams::cli::io))]
    Io { message: String },

    /// Anything else, already formatted
    #[error("{message}")]
    #[diagnostic(code(chartstreams::cli::error))]
    Other {
        message: String,
        #[help]
        help: Option<String>,
    },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Repository { .. } => exit_codes::REPOSITORY_ERROR,
            CliError::Chart { .. } => exit_codes::CHART_ERROR,
            CliError::Usage { .. } => exit_codes::USAGE_ERROR,
            CliError::Io { .. } => exit_codes::IO_ERROR,
            CliError::Other { .. } => exit_codes::ERROR,
        }
    }

    /// Create a usage error with help text
    pub fn usage_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Usage {
            message: message.into(),
            help: Some(help.into()),
        }
    }
}

impl From<RepoError> for CliError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::Repository { message } => CliError::Repository {
                message,
                help: Some("check --repo-url and that the repository is reachable".to_string()),
            },
            RepoError::InvalidMetadata { path, message } => CliError::Chart {
                message: format!("{}: {}", path, message),
                help: Some("fix the Chart.yaml or pass --skip-invalid".to_string()),
            },
            RepoError::VersionNotFound { name, version } => CliError::Chart {
                message: format!("{}@{} is not in the index", name, version),
                help: Some("run `chartstreams index` to list the available versions".to_string()),
            },
            RepoError::InvalidConfig { message } => CliError::Usage {
                message,
                help: None,
            },
            RepoError::Io(e) => CliError::Io {
                message: e.to_string(),
            },
            err @ RepoError::DeadlineExceeded { .. } => CliError::Other {
                message: err.to_string(),
                help: Some("raise materializeTimeout in the configuration".to_string()),
            },
            other => CliError::Other {
                message: other.to_string(),
                help: None,
            },
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io {
            message: err.to_string(),
        }
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
