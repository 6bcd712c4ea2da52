//! Client command dispatch.
//!
//! `PUB` encodes a packet and hands it to the broadcast transport. `SUB`
//! replaces the session's filter and never populates it: topic membership
//! only arrives through [`ClientSession::add_topic_locally`]. Neither command
//! produces a response frame.

use bloomcast_proto::{Command, FilterParams, Packet};
use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::{error::SessionError, session::ClientSession, transport::BroadcastTransport};

/// What a dispatched frame did. Used for logging and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Frame shorter than four bytes, nothing done
    Ignored,
    /// Packet handed to the transport (send errors are already logged)
    Published {
        /// Topic bytes as sent by the client
        topic: Bytes,
    },
    /// Filter replaced
    FilterUpdated(FilterParams),
    /// `SUB` payload rejected, previous filter kept
    FilterRejected(SessionError),
    /// Unrecognized command code
    Unknown(String),
}

/// Handle one command frame from `session`.
pub async fn dispatch<T>(session: &ClientSession, frame: &[u8], transport: &T) -> DispatchOutcome
where
    T: BroadcastTransport + ?Sized,
{
    let Some(command) = Command::parse(frame) else {
        debug!(client_id = session.id(), len = frame.len(), "ignoring short frame");
        return DispatchOutcome::Ignored;
    };

    match command {
        Command::Publish { topic, message } => {
            publish(transport, &topic, &message).await;
            DispatchOutcome::Published { topic }
        },
        Command::Subscribe { payload } => match session.update_filter(&payload) {
            Ok(params) => {
                info!(
                    client_id = session.id(),
                    bit_size = params.bit_size,
                    hash_count = params.hash_count,
                    "client filter updated"
                );
                DispatchOutcome::FilterUpdated(params)
            },
            Err(e) => {
                warn!(client_id = session.id(), error = %e, "failed to update filter");
                DispatchOutcome::FilterRejected(e)
            },
        },
        Command::Unknown { code } => {
            warn!(client_id = session.id(), %code, "unknown command");
            DispatchOutcome::Unknown(code)
        },
    }
}

/// Encode and broadcast one message. Send failures are logged, never returned.
///
/// Topic and message bytes are copied into the packet unchanged.
pub async fn publish<T>(transport: &T, topic: &[u8], message: &[u8])
where
    T: BroadcastTransport + ?Sized,
{
    let packet = Packet::encode(topic, message);
    if let Err(e) = transport.send(&packet).await {
        warn!(error = %e, topic = %String::from_utf8_lossy(topic), "broadcast send failed");
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use async_trait::async_trait;
    use bloomcast_proto::ProtocolError;
    use hex_literal::hex;

    use super::*;
    use crate::{session::SessionState, transport::MemorySegment};

    struct FailingTransport;

    #[async_trait]
    impl BroadcastTransport for FailingTransport {
        async fn send(&self, _packet: &Packet) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "no broadcast"))
        }

        async fn recv(&self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::other("unused"))
        }
    }

    fn session() -> ClientSession {
        ClientSession::with_queue(1, "test", 4).0
    }

    #[tokio::test]
    async fn publish_broadcasts_packet() {
        let segment = MemorySegment::default();
        let transport = segment.attach();
        let s = session();

        let outcome = dispatch(&s, b"PUB alerts|evacuate now", &transport).await;
        assert_eq!(outcome, DispatchOutcome::Published { topic: "alerts".into() });

        let mut buf = [0u8; 128];
        let n = transport.recv(&mut buf).await.unwrap();
        assert_eq!(n, 64);
        let packet = Packet::decode(&buf[..n]).unwrap();
        assert_eq!(packet.topic_and_message(), (&b"alerts"[..], &b"evacuate now"[..]));
    }

    #[tokio::test]
    async fn non_utf8_publish_is_broadcast_byte_for_byte() {
        let segment = MemorySegment::default();
        let transport = segment.attach();
        let s = session();

        let outcome = dispatch(&s, b"PUB caf\xe9|x", &transport).await;
        assert_eq!(outcome, DispatchOutcome::Published { topic: Bytes::from_static(b"caf\xe9") });

        let mut buf = [0u8; 128];
        let n = transport.recv(&mut buf).await.unwrap();
        assert_eq!(n, 64);
        assert_eq!(buf[2], 4);
        assert_eq!(&buf[..9], &hex!("01 01 04 63 61 66 e9 7c 78")[..]);
        assert!(buf[9..n].iter().all(|&b| b == 0));
    }

    #[tokio::test]
    async fn publish_send_failure_is_not_fatal() {
        let s = session();
        let outcome = dispatch(&s, b"PUB t|m", &FailingTransport).await;
        assert_eq!(outcome, DispatchOutcome::Published { topic: "t".into() });
    }

    #[tokio::test]
    async fn subscribe_resets_filter_only() {
        let s = session();
        let frame = FilterParams::new(1000, 4).to_frame();

        let outcome = dispatch(&s, &frame, &FailingTransport).await;
        assert_eq!(outcome, DispatchOutcome::FilterUpdated(FilterParams::new(1000, 4)));
        assert_eq!(s.state(), SessionState::Filtered);
        assert!(!s.test_topic("weather"));
    }

    #[tokio::test]
    async fn short_subscribe_is_rejected() {
        let s = session();
        let outcome = dispatch(&s, b"SUB \x00\x00", &FailingTransport).await;
        assert_eq!(
            outcome,
            DispatchOutcome::FilterRejected(SessionError::InvalidFilterParameters(
                ProtocolError::TooShort { expected: 8, actual: 2 }
            ))
        );
        assert_eq!(s.state(), SessionState::Connected);
    }

    #[tokio::test]
    async fn unknown_and_short_frames() {
        let s = session();
        assert_eq!(dispatch(&s, b"HI", &FailingTransport).await, DispatchOutcome::Ignored);
        assert_eq!(
            dispatch(&s, b"FOO bar", &FailingTransport).await,
            DispatchOutcome::Unknown("FOO".into())
        );
    }
}
