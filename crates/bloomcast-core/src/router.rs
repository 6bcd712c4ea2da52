//! Inbound routing and fan-out.
//!
//! Every datagram from the broadcast transport is checked for exact size and
//! protocol version, split into topic and message whatever its type byte, and queued to each
//! registered session whose filter matches the topic. Foreign or malformed
//! traffic is expected on a shared segment, so drops are only traced.
//!
//! Delivery goes through each session's bounded outbound queue, so one slow
//! client never holds up the pass. A full queue drops that one delivery.

use std::sync::Arc;

use bloomcast_proto::{Delivery, PACKET_SIZE, PROTOCOL_VERSION, Packet};
use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::{error::DeliveryError, registry::ClientRegistry, transport::BroadcastTransport};

/// Receive buffer size. Larger than a packet so oversized datagrams are
/// seen at their real length instead of silently truncated to 64 bytes.
pub const RECV_BUFFER_SIZE: usize = 2048;

/// Why a datagram was not routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Datagram length was not exactly [`PACKET_SIZE`]
    WrongSize(usize),
    /// Version byte did not match [`PROTOCOL_VERSION`]
    WrongVersion(u8),
}

/// Result of routing one datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Datagram was discarded before fan-out
    Dropped(DropReason),
    /// Datagram was fanned out
    Delivered {
        /// Sessions whose filter matched
        matched: usize,
        /// Sessions the delivery was actually queued for
        queued: usize,
    },
}

/// Fans inbound packets out to matching sessions.
#[derive(Debug, Clone)]
pub struct Router {
    registry: Arc<ClientRegistry>,
}

impl Router {
    /// Create a router over `registry`.
    pub fn new(registry: Arc<ClientRegistry>) -> Self {
        Self { registry }
    }

    /// Registry this router delivers into.
    pub fn registry(&self) -> &Arc<ClientRegistry> {
        &self.registry
    }

    /// Validate and route one raw datagram.
    pub fn route_datagram(&self, datagram: &[u8]) -> RouteOutcome {
        let packet = match validate(datagram) {
            Ok(packet) => packet,
            Err(reason) => {
                trace!(?reason, len = datagram.len(), "dropping datagram");
                return RouteOutcome::Dropped(reason);
            },
        };

        let (topic, message) = packet.topic_and_message();
        let delivery = Delivery::new(Bytes::copy_from_slice(topic), Bytes::copy_from_slice(message));
        let (matched, queued) = self.fanout(&delivery);
        RouteOutcome::Delivered { matched, queued }
    }

    /// Queue `delivery` for every session whose filter matches its topic.
    ///
    /// Returns `(matched, queued)`.
    pub fn fanout(&self, delivery: &Delivery) -> (usize, usize) {
        let frame = delivery.to_frame();
        let (mut matched, mut queued) = (0, 0);

        self.registry.for_each(|session| {
            if !session.test_topic(&delivery.topic) {
                return;
            }
            matched += 1;
            match session.deliver(frame.clone()) {
                Ok(()) => queued += 1,
                Err(DeliveryError::QueueFull) => {
                    warn!(client_id = session.id(), topic = ?delivery.topic, "outbound queue full, dropping delivery");
                },
                Err(DeliveryError::Closed) => {
                    debug!(client_id = session.id(), "skipping delivery to closed session");
                },
            }
        });

        trace!(topic = ?delivery.topic, matched, queued, "fan-out complete");
        (matched, queued)
    }

    /// Receive and route datagrams until `cancel` fires.
    ///
    /// Receive errors are logged and the loop continues; only cancellation
    /// ends it.
    pub async fn run<T>(&self, transport: &T, cancel: CancellationToken)
    where
        T: BroadcastTransport + ?Sized,
    {
        let mut buf = vec![0u8; RECV_BUFFER_SIZE];
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                result = transport.recv(&mut buf) => match result {
                    Ok(n) => {
                        self.route_datagram(&buf[..n]);
                    },
                    Err(e) => {
                        if cancel.is_cancelled() {
                            break;
                        }
                        warn!(error = %e, "broadcast receive failed");
                    },
                },
            }
        }
        debug!("routing loop stopped");
    }
}

/// Accept a datagram for routing: exact size and current version.
///
/// The type byte is not checked. Alive packets are routed like publishes.
pub fn validate(datagram: &[u8]) -> Result<Packet, DropReason> {
    if datagram.len() != PACKET_SIZE {
        return Err(DropReason::WrongSize(datagram.len()));
    }
    let packet = Packet::decode(datagram).map_err(|_| DropReason::WrongSize(datagram.len()))?;
    if packet.version() != PROTOCOL_VERSION {
        return Err(DropReason::WrongVersion(packet.version()));
    }
    Ok(packet)
}
