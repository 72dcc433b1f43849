//! Error types for CLI operations.

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Submission data file unreadable or not a field map
    #[error("Invalid submission data in {path}: {message}")]
    InvalidData { path: String, message: String },

    /// Distribution error
    #[error(transparent)]
    Distributor(#[from] contracts::DistributorError),

    /// Dispatcher construction error
    #[error(transparent)]
    Dispatcher(#[from] dispatcher::DispatcherError),

    /// Queue error
    #[error(transparent)]
    Queue(#[from] contracts::QueueError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn invalid_data(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidData {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
