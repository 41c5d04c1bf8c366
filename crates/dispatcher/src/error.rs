//! Dispatcher error types

use thiserror::Error;

/// Dispatcher-specific errors
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Rejected before any task was spawned
    #[error("invalid dispatch config '{field}': {message}")]
    InvalidConfig { field: String, message: String },

    /// The operation source failed (preload or mid-stream)
    #[error("source error: {0}")]
    Source(#[from] contracts::ContractError),

    /// Every consumer dropped the handoff queue while ops were still pending
    #[error("all consumers dropped the handoff queue after {dispatched} ops")]
    ConsumersGone { dispatched: u64 },

    /// The dispatch task panicked or was aborted
    #[error("dispatch task failed: {message}")]
    TaskFailed { message: String },
}

impl DispatchError {
    /// Create an invalid configuration error
    pub fn invalid_config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            message: message.into(),
        }
    }
}
