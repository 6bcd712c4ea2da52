//! Daemon error types.

use std::io;

use thiserror::Error;

/// Errors that stop the daemon from starting.
#[derive(Debug, Error)]
pub enum DaemonError {
    /// Could not bind a socket
    #[error("failed to bind {what} on {address}: {source}")]
    Bind {
        /// Which socket ("client listener", "broadcast socket")
        what: &'static str,
        /// Address that failed
        address: String,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// Listen address string could not be parsed
    #[error("invalid listen address: {0:?}")]
    InvalidListenAddr(String),

    /// Other I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
