//! Client command frames.
//!
//! A frame is a three byte command code, one delimiter byte (not checked),
//! and a payload. Frames shorter than four bytes carry no command.
//!
//! ```text
//! PUB <topic>|<message>
//! SUB <bitSize: u32 BE><hashCount: u32 BE>
//! ```

use bytes::{BufMut, Bytes, BytesMut};

use crate::{
    errors::{Result, ensure_min_len},
    packet::{TOPIC_DELIMITER, split_topic},
};

/// Command code for publishing.
pub const PUB: &[u8; 3] = b"PUB";

/// Command code for resetting the subscription filter.
pub const SUB: &[u8; 3] = b"SUB";

/// Delimiter written after the command code.
pub const COMMAND_DELIMITER: u8 = b' ';

/// Minimum frame length that carries a command.
pub const MIN_FRAME_LEN: usize = 4;

/// Parsed client command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Broadcast `message` on `topic`. Both are carried as raw bytes.
    Publish {
        /// Topic name (everything before the first `|`)
        topic: Bytes,
        /// Message body (everything after the first `|`)
        message: Bytes,
    },

    /// Replace the subscription filter. Payload is kept raw so that a short
    /// payload surfaces as a filter error rather than a parse error.
    Subscribe {
        /// Raw filter parameter bytes
        payload: Bytes,
    },

    /// Any other three byte code.
    Unknown {
        /// The code as sent, lossily decoded
        code: String,
    },
}

impl Command {
    /// Parse one frame. Returns `None` for frames under four bytes.
    pub fn parse(frame: &[u8]) -> Option<Self> {
        if frame.len() < MIN_FRAME_LEN {
            return None;
        }

        let (code, payload) = (&frame[..3], &frame[MIN_FRAME_LEN..]);
        let command = match code {
            c if c == PUB => {
                let (topic, message) = split_topic(payload);
                Self::Publish {
                    topic: Bytes::copy_from_slice(topic),
                    message: Bytes::copy_from_slice(message),
                }
            },
            c if c == SUB => Self::Subscribe { payload: Bytes::copy_from_slice(payload) },
            other => Self::Unknown { code: String::from_utf8_lossy(other).into_owned() },
        };
        Some(command)
    }

    /// Serialize to a frame.
    pub fn to_frame(&self) -> Bytes {
        match self {
            Self::Publish { topic, message } => {
                let mut buf = BytesMut::with_capacity(MIN_FRAME_LEN + topic.len() + 1 + message.len());
                buf.put_slice(PUB);
                buf.put_u8(COMMAND_DELIMITER);
                buf.put_slice(topic);
                buf.put_u8(TOPIC_DELIMITER);
                buf.put_slice(message);
                buf.freeze()
            },
            Self::Subscribe { payload } => {
                let mut buf = BytesMut::with_capacity(MIN_FRAME_LEN + payload.len());
                buf.put_slice(SUB);
                buf.put_u8(COMMAND_DELIMITER);
                buf.put_slice(payload);
                buf.freeze()
            },
            Self::Unknown { code } => {
                let mut buf = BytesMut::with_capacity(MIN_FRAME_LEN);
                buf.put_slice(code.as_bytes());
                buf.put_u8(COMMAND_DELIMITER);
                buf.freeze()
            },
        }
    }
}

/// Subscription filter dimensions carried by a `SUB` payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterParams {
    /// Number of bits in the filter
    pub bit_size: u32,
    /// Number of hash functions
    pub hash_count: u32,
}

impl FilterParams {
    /// Encoded size.
    pub const SIZE: usize = 8;

    /// Create parameters directly.
    pub fn new(bit_size: u32, hash_count: u32) -> Self {
        Self { bit_size, hash_count }
    }

    /// Optimal dimensions for `capacity` items at false-positive rate `fp_rate`.
    ///
    /// Uses `m = -n ln p / (ln 2)^2` and `k = (m / n) ln 2`, each at least 1.
    pub fn with_estimates(capacity: u32, fp_rate: f64) -> Self {
        let n = f64::from(capacity.max(1));
        let p = fp_rate.clamp(f64::MIN_POSITIVE, 0.999_999);
        let ln2 = std::f64::consts::LN_2;

        let m = (-n * p.ln() / (ln2 * ln2)).ceil().clamp(1.0, f64::from(u32::MAX));
        let k = ((m / n) * ln2).round().clamp(1.0, f64::from(u32::MAX));
        Self { bit_size: m as u32, hash_count: k as u32 }
    }

    /// Read the first eight bytes of a `SUB` payload. Extra bytes are ignored.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        ensure_min_len(bytes)?;
        let bit_size = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let hash_count = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        Ok(Self { bit_size, hash_count })
    }

    /// Encode as eight big-endian bytes.
    pub fn to_bytes(self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[..4].copy_from_slice(&self.bit_size.to_be_bytes());
        out[4..].copy_from_slice(&self.hash_count.to_be_bytes());
        out
    }

    /// Build a complete `SUB` frame.
    pub fn to_frame(self) -> Bytes {
        Command::Subscribe { payload: Bytes::copy_from_slice(&self.to_bytes()) }.to_frame()
    }
}
