//! Error types for the simulation harness.

use denominator_core::CoreError;
use denominator_env::EnvError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("Environment error: {0}")]
    Env(#[from] EnvError),

    #[error("Core error: {0}")]
    Core(#[from] CoreError),

    #[error("Invalid simulation config: {0}")]
    InvalidConfig(String),

    /// The parent got something other than the completion notice
    #[error("Unexpected completion notice: {0}")]
    UnexpectedNotice(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SimError {
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}
