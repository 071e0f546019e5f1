//! Error types for the denominator core.

use thiserror::Error;

/// Errors raised by configuration, parsing and persistence.
///
/// None of these are fatal to a running actor: the control loop logs
/// them and carries on.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid duration: {0}")]
    InvalidDuration(String),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CoreError {
    pub fn invalid_duration(literal: impl Into<String>) -> Self {
        Self::InvalidDuration(literal.into())
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}
