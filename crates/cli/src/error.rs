//! Error types for CLI operations.

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Recording could not be opened or read
    #[error("Failed to read recording: {0}")]
    Source(#[from] contracts::ContractError),

    /// Dispatch rejected its configuration or failed mid-run
    #[error("Dispatch failed: {0}")]
    Dispatch(#[from] dispatcher::DispatchError),

    /// A consumer task panicked
    #[error("Consumer task failed: {message}")]
    Consumer { message: String },

    /// Generic error wrapper
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn consumer(message: impl Into<String>) -> Self {
        Self::Consumer {
            message: message.into(),
        }
    }
}

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
