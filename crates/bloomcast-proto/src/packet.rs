//! Fixed-size broadcast packet.
//!
//! Every publish crosses the segment as exactly [`PACKET_SIZE`] bytes. The
//! payload is `topic|message`, right-padded with nulls and cut off at
//! [`PAYLOAD_SIZE`] bytes without error. The topic length byte always
//! describes the topic as the publisher supplied it, even when truncation
//! removed part of that topic from the payload.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::{
    errors::{Result, ensure_min_len},
    message_type::MessageType,
};

/// The only protocol version this implementation speaks.
pub const PROTOCOL_VERSION: u8 = 0x01;

/// Size of every packet on the wire.
pub const PACKET_SIZE: usize = 64;

/// Size of the `topic|message` region.
pub const PAYLOAD_SIZE: usize = PACKET_SIZE - 3;

/// Byte separating topic from message inside the payload.
pub const TOPIC_DELIMITER: u8 = b'|';

/// Broadcast packet (64 bytes, all fields single bytes so no padding).
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct Packet {
    version: u8,
    message_type: u8,
    topic_len: u8,
    payload: [u8; PAYLOAD_SIZE],
}

const _: () = assert!(std::mem::size_of::<Packet>() == PACKET_SIZE);

impl Packet {
    /// Build a publish packet for `topic` and `message`.
    ///
    /// Bytes are copied as given; nothing is re-encoded. `topic_len` is
    /// `len(topic)` as a byte (wrapping above 255) and is not reconciled with
    /// the truncated payload.
    pub fn encode(topic: impl AsRef<[u8]>, message: impl AsRef<[u8]>) -> Self {
        let (topic, message) = (topic.as_ref(), message.as_ref());
        let mut payload = [0u8; PAYLOAD_SIZE];
        let combined = topic.iter().chain(std::iter::once(&TOPIC_DELIMITER)).chain(message);
        for (slot, byte) in payload.iter_mut().zip(combined) {
            *slot = *byte;
        }

        Self {
            version: PROTOCOL_VERSION,
            message_type: MessageType::Publish.to_u8(),
            topic_len: topic.len() as u8,
            payload,
        }
    }

    /// Build a packet with an arbitrary type and raw payload bytes.
    ///
    /// Payload bytes beyond [`PAYLOAD_SIZE`] are dropped.
    pub fn with_payload(message_type: MessageType, topic_len: u8, raw: &[u8]) -> Self {
        let mut payload = [0u8; PAYLOAD_SIZE];
        let n = raw.len().min(PAYLOAD_SIZE);
        payload[..n].copy_from_slice(&raw[..n]);
        Self { version: PROTOCOL_VERSION, message_type: message_type.to_u8(), topic_len, payload }
    }

    /// Read a packet out of raw bytes.
    ///
    /// Inputs shorter than 8 bytes fail with [`crate::ProtocolError::TooShort`].
    /// Shorter-than-packet inputs are zero-extended and longer inputs are cut
    /// at [`PACKET_SIZE`]; callers on the wire path reject anything that is not
    /// exactly [`PACKET_SIZE`] before calling this.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        ensure_min_len(bytes)?;

        let mut raw = [0u8; PACKET_SIZE];
        let n = bytes.len().min(PACKET_SIZE);
        raw[..n].copy_from_slice(&bytes[..n]);
        Ok(zerocopy::transmute!(raw))
    }

    /// Serialize to the 64-byte wire form.
    pub fn to_bytes(&self) -> [u8; PACKET_SIZE] {
        zerocopy::transmute!(*self)
    }

    /// Borrow the wire form without copying.
    pub fn as_wire(&self) -> &[u8] {
        self.as_bytes()
    }

    /// Protocol version byte.
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Raw message type byte.
    pub fn raw_message_type(&self) -> u8 {
        self.message_type
    }

    /// Parsed message type, `None` if the byte is unknown.
    pub fn message_type(&self) -> Option<MessageType> {
        MessageType::from_u8(self.message_type)
    }

    /// Topic length byte as written by the publisher.
    pub fn topic_len(&self) -> u8 {
        self.topic_len
    }

    /// Raw payload including null padding.
    pub fn payload(&self) -> &[u8; PAYLOAD_SIZE] {
        &self.payload
    }

    /// Payload with trailing null bytes removed.
    pub fn trimmed_payload(&self) -> &[u8] {
        let end = self.payload.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
        &self.payload[..end]
    }

    /// Split the trimmed payload into `(topic, message)` on the first `|`.
    ///
    /// A payload without a delimiter is all topic. Bytes are returned as they
    /// arrived, including a character cut in half by truncation.
    pub fn topic_and_message(&self) -> (&[u8], &[u8]) {
        split_topic(self.trimmed_payload())
    }
}

/// Split `topic|message` on the first delimiter; no delimiter means all topic.
pub(crate) fn split_topic(payload: &[u8]) -> (&[u8], &[u8]) {
    match payload.iter().position(|&b| b == TOPIC_DELIMITER) {
        Some(split) => (&payload[..split], &payload[split + 1..]),
        None => (payload, &[]),
    }
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;
    use proptest::prelude::*;

    use super::*;
    use crate::ProtocolError;

    #[test]
    fn encode_weather_layout() {
        let bytes = Packet::encode("weather", "sunny").to_bytes();

        assert_eq!(bytes.len(), PACKET_SIZE);
        assert_eq!(bytes[0], PROTOCOL_VERSION);
        assert_eq!(bytes[1], MessageType::Publish.to_u8());
        assert_eq!(bytes[2], 7);
        assert_eq!(&bytes[3..16], b"weather|sunny");
        assert!(bytes[16..].iter().all(|&b| b == 0));
    }

    #[test]
    fn encode_matches_known_bytes() {
        let mut expected = [0u8; PACKET_SIZE];
        expected[..8].copy_from_slice(&hex!("01 01 01 61 7c 62 00 00"));
        assert_eq!(Packet::encode("a", "b").to_bytes(), expected);
    }

    #[test]
    fn decode_exact_packet() {
        let packet = Packet::encode("alerts", "evacuate now");
        let decoded = Packet::decode(&packet.to_bytes()).unwrap();
        assert_eq!(decoded, packet);
        assert_eq!(decoded.topic_and_message(), (&b"alerts"[..], &b"evacuate now"[..]));
    }

    #[test]
    fn decode_rejects_fewer_than_eight_bytes() {
        let err = Packet::decode(&[1, 1, 1, b'a']).unwrap_err();
        assert_eq!(err, ProtocolError::TooShort { expected: 8, actual: 4 });
    }

    #[test]
    fn decode_zero_extends_short_input() {
        let packet = Packet::decode(&[1, 1, 1, b'x', b'|', b'y', 0, 0]).unwrap();
        assert_eq!(packet.topic_and_message(), (&b"x"[..], &b"y"[..]));
    }

    #[test]
    fn decode_ignores_bytes_past_packet() {
        let mut raw = Packet::encode("t", "m").to_bytes().to_vec();
        raw.extend_from_slice(b"trailing garbage");
        assert_eq!(Packet::decode(&raw).unwrap(), Packet::encode("t", "m"));
    }

    #[test]
    fn missing_delimiter_is_all_topic() {
        let packet = Packet::with_payload(MessageType::Publish, 5, b"lonely");
        assert_eq!(packet.topic_and_message(), (&b"lonely"[..], &b""[..]));
    }

    #[test]
    fn pipe_in_topic_splits_early() {
        let packet = Packet::encode("a|b", "c");
        assert_eq!(packet.topic_len(), 3);
        assert_eq!(packet.topic_and_message(), (&b"a"[..], &b"b|c"[..]));
    }

    #[test]
    fn truncation_can_remove_delimiter() {
        let topic = "t".repeat(70);
        let packet = Packet::encode(&topic, "msg");

        assert_eq!(packet.topic_len(), 70);
        assert_eq!(packet.trimmed_payload(), "t".repeat(PAYLOAD_SIZE).as_bytes());
        assert_eq!(packet.topic_and_message(), ("t".repeat(PAYLOAD_SIZE).as_bytes(), &b""[..]));
    }

    #[test]
    fn non_utf8_bytes_are_copied_verbatim() {
        let packet = Packet::encode(b"caf\xe9", b"x");
        assert_eq!(packet.topic_len(), 4);
        assert_eq!(&packet.to_bytes()[..9], &hex!("01 01 04 63 61 66 e9 7c 78"));
        assert_eq!(packet.topic_and_message(), (&b"caf\xe9"[..], &b"x"[..]));
    }

    #[test]
    fn truncated_multibyte_char_is_not_rewritten() {
        // "topic|" then 27 two-byte chars leaves one byte: the first half of the 28th
        let message = "é".repeat(40);
        let packet = Packet::encode("topic", &message);
        let (_, cut) = packet.topic_and_message();
        assert_eq!(cut.len(), PAYLOAD_SIZE - 6);
        assert_eq!(cut, &message.as_bytes()[..PAYLOAD_SIZE - 6]);
    }

    #[test]
    fn long_topic_length_wraps() {
        let topic = "x".repeat(300);
        assert_eq!(Packet::encode(&topic, "").topic_len(), (300 % 256) as u8);
    }

    #[test]
    fn alive_packets_decode() {
        let packet = Packet::with_payload(MessageType::Alive, 0, &[]);
        let decoded = Packet::decode(packet.as_wire()).unwrap();
        assert_eq!(decoded.message_type(), Some(MessageType::Alive));
        assert_eq!(decoded.version(), PROTOCOL_VERSION);
    }

    #[test]
    fn unknown_type_is_preserved() {
        let mut raw = Packet::encode("t", "m").to_bytes();
        raw[1] = 0x7F;
        let decoded = Packet::decode(&raw).unwrap();
        assert_eq!(decoded.raw_message_type(), 0x7F);
        assert_eq!(decoded.message_type(), None);
    }

    proptest! {
        #[test]
        fn prop_roundtrip_when_it_fits(topic in "[a-z/]{0,30}", message in "[ -{}~]{0,30}") {
            prop_assume!(topic.len() + 1 + message.len() <= PAYLOAD_SIZE);
            let decoded = Packet::decode(&Packet::encode(&topic, &message).to_bytes()).unwrap();
            prop_assert_eq!(decoded.topic_and_message(), (topic.as_bytes(), message.as_bytes()));
        }

        #[test]
        fn prop_truncates_to_payload_prefix(topic in "[a-z]{1,40}", message in "[a-z ]{1,60}") {
            let combined = format!("{topic}|{message}");
            prop_assume!(combined.len() > PAYLOAD_SIZE);
            let packet = Packet::encode(&topic, &message);
            prop_assert_eq!(&packet.payload()[..], &combined.as_bytes()[..PAYLOAD_SIZE]);
            prop_assert_eq!(packet.topic_len() as usize, topic.len());
        }

        #[test]
        fn prop_decode_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..128)) {
            let result = Packet::decode(&bytes);
            prop_assert_eq!(result.is_ok(), bytes.len() >= 8);
        }
    }
}
