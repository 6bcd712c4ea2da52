//! Client errors.

use std::io;

/// Errors returned by [`crate::PubSubClient`] and the frame builders.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Topic plus delimiter leaves no room for a message in one packet.
    #[error("topic too long: {len} bytes (max {max})")]
    TopicTooLong {
        /// Topic length in bytes
        len: usize,
        /// Longest topic that still fits
        max: usize,
    },

    /// Daemon connection failed.
    #[error("connection error: {0}")]
    Io(#[from] io::Error),

    /// Daemon closed the connection.
    #[error("connection closed by daemon")]
    Closed,
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, ClientError>;
