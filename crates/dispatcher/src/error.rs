//! Dispatcher error types

use thiserror::Error;

/// Dispatcher-specific errors
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// Dispatcher creation error
    #[error("failed to create dispatcher '{name}': {message}")]
    Creation { name: String, message: String },

    /// Two dispatchers configured with the same name
    #[error("duplicate dispatcher name '{0}'")]
    DuplicateName(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl DispatcherError {
    /// Create a dispatcher creation error
    pub fn creation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Creation {
            name: name.into(),
            message: message.into(),
        }
    }
}
