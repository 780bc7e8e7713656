//! Error types for repository operations

use chartstreams_core::CoreError;
use thiserror::Error;

/// Repository operation errors
#[derive(Debug, Error)]
pub enum RepoError {
    // ============ Git Errors ============
    #[error("Repository error: {message}")]
    Repository { message: String },

    // ============ Chart Errors ============
    #[error("Invalid chart metadata in {path}: {message}")]
    InvalidMetadata { path: String, message: String },

    #[error("Version not found: {name}@{version}")]
    VersionNotFound { name: String, version: String },

    #[error("Archive error: {message}")]
    Archive { message: String },

    // ============ Request Errors ============
    #[error("Deadline exceeded after {millis}ms")]
    DeadlineExceeded { millis: u64 },

    #[error("Chart index has not been built yet")]
    NotInitialized,

    // ============ Configuration Errors ============
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    // ============ IO Errors ============
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    // ============ Other ============
    #[error("{0}")]
    Other(String),
}

impl RepoError {
    pub fn repository(message: impl Into<String>) -> Self {
        RepoError::Repository {
            message: message.into(),
        }
    }

    /// Whether the caller asked for something that does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, RepoError::VersionNotFound { .. })
    }
}

/// Result type for repository operations
pub type Result<T> = std::result::Result<T, RepoError>;

impl From<git2::Error> for RepoError {
    fn from(e: git2::Error) -> Self {
        RepoError::Repository {
            message: e.message().to_string(),
        }
    }
}

impl From<CoreError> for RepoError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::NotAPackage { path } => RepoError::Repository {
                message: format!("not a chart directory: {}", path),
            },
            CoreError::InvalidChart { path, message } => {
                RepoError::InvalidMetadata { path, message }
            }
            CoreError::Archive { message } => RepoError::Archive { message },
            CoreError::Io(e) => RepoError::Io(e),
        }
    }
}

impl From<serde_yaml::Error> for RepoError {
    fn from(e: serde_yaml::Error) -> Self {
        RepoError::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for RepoError {
    fn from(e: serde_json::Error) -> Self {
        RepoError::Serialization(e.to_string())
    }
}

impl From<tokio::task::JoinError> for RepoError {
    fn from(e: tokio::task::JoinError) -> Self {
        RepoError::Other(format!("background task failed: {}", e))
    }
}
