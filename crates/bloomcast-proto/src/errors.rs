//! Protocol error types.

use thiserror::Error;

/// Convenience alias for protocol results.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors raised while reading protocol values from raw bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Input shorter than the minimum the reader needs.
    #[error("input too short: expected at least {expected} bytes, got {actual}")]
    TooShort {
        /// Minimum number of bytes required
        expected: usize,
        /// Number of bytes supplied
        actual: usize,
    },
}

/// Minimum length accepted by the low-level header readers.
///
/// Shared by [`crate::Packet::decode`] and [`crate::FilterParams::decode`].
pub const MIN_HEADER_LEN: usize = 8;

pub(crate) fn ensure_min_len(bytes: &[u8]) -> Result<()> {
    if bytes.len() < MIN_HEADER_LEN {
        return Err(ProtocolError::TooShort { expected: MIN_HEADER_LEN, actual: bytes.len() });
    }
    Ok(())
}
