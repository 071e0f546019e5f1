//! Error types for the environment abstraction.

use thiserror::Error;

/// Errors that can occur in the environment abstraction layer.
#[derive(Debug, Error)]
pub enum EnvError {
    /// The receiving inbox has been dropped (its actor exited)
    #[error("Mailbox closed: {0}")]
    MailboxClosed(String),

    /// Operation timed out
    #[error("Timeout after {0}ms")]
    Timeout(u64),
}

impl EnvError {
    /// Creates a closed-mailbox error.
    pub fn closed(mailbox: impl std::fmt::Display) -> Self {
        Self::MailboxClosed(mailbox.to_string())
    }

    /// Creates a timeout error from a duration.
    pub fn timeout(after: std::time::Duration) -> Self {
        Self::Timeout(after.as_millis() as u64)
    }
}
