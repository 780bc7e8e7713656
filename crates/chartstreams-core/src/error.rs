//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    /// The candidate path is not a directory, or has no Chart.yaml directly beneath it
    #[error("Not a chart directory: {path}")]
    NotAPackage { path: String },

    #[error("Invalid Chart.yaml in {path}: {message}")]
    InvalidChart { path: String, message: String },

    #[error("Archive error: {message}")]
    Archive { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// Whether this error only means "skip this candidate"
    pub fn is_not_a_package(&self) -> bool {
        matches!(self, CoreError::NotAPackage { .. })
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
