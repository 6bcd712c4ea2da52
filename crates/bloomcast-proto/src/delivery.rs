//! Server to client delivery frames (`MSG <topic>|<message>`).

use bytes::{BufMut, Bytes, BytesMut};

use crate::packet::{TOPIC_DELIMITER, split_topic};

/// Prefix of every delivery frame.
pub const MSG_PREFIX: &[u8; 4] = b"MSG ";

/// A message delivered to a subscribed client.
///
/// Topic and message are the bytes the publisher sent; they need not be
/// UTF-8.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Topic the message was published on
    pub topic: Bytes,
    /// Message body
    pub message: Bytes,
}

impl Delivery {
    /// Create a delivery.
    pub fn new(topic: impl Into<Bytes>, message: impl Into<Bytes>) -> Self {
        Self { topic: topic.into(), message: message.into() }
    }

    /// Topic as text, `None` if it is not valid UTF-8.
    pub fn topic_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.topic).ok()
    }

    /// Message as text, `None` if it is not valid UTF-8.
    pub fn message_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.message).ok()
    }

    /// Encode as `MSG <topic>|<message>`. No terminator is appended.
    pub fn to_frame(&self) -> Bytes {
        let mut buf =
            BytesMut::with_capacity(MSG_PREFIX.len() + self.topic.len() + 1 + self.message.len());
        buf.put_slice(MSG_PREFIX);
        buf.put_slice(&self.topic);
        buf.put_u8(TOPIC_DELIMITER);
        buf.put_slice(&self.message);
        buf.freeze()
    }

    /// Parse a delivery frame. Returns `None` if the `MSG ` prefix is missing.
    pub fn parse(frame: &[u8]) -> Option<Self> {
        let body = frame.strip_prefix(MSG_PREFIX.as_slice())?;
        let (topic, message) = split_topic(body);
        Some(Self::new(Bytes::copy_from_slice(topic), Bytes::copy_from_slice(message)))
    }
}
