//! Broadcast transport abstraction.
//!
//! Production uses a UDP socket with `SO_BROADCAST` (in the daemon crate).
//! Tests use [`MemorySegment`], an in-process broadcast domain where every
//! attached endpoint (including the sender) sees every datagram.

use std::io;

use async_trait::async_trait;
use bloomcast_proto::Packet;
use bytes::Bytes;
use tokio::sync::{Mutex, broadcast};
use tracing::warn;

/// Datagram channel shared with every daemon on the segment.
#[async_trait]
pub trait BroadcastTransport: Send + Sync + 'static {
    /// Send one packet to the broadcast destination.
    ///
    /// Callers treat errors as non-fatal.
    async fn send(&self, packet: &Packet) -> io::Result<()>;

    /// Receive the next datagram into `buf`, returning its length.
    ///
    /// Datagrams longer than `buf` are truncated to `buf.len()`. Blocks until
    /// a datagram arrives or the channel fails.
    async fn recv(&self, buf: &mut [u8]) -> io::Result<usize>;
}

/// In-process broadcast domain.
#[derive(Debug, Clone)]
pub struct MemorySegment {
    tx: broadcast::Sender<Bytes>,
}

impl MemorySegment {
    /// Create a segment that buffers up to `capacity` datagrams per endpoint.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Attach a new endpoint. It sees datagrams sent after this call.
    pub fn attach(&self) -> MemoryBroadcast {
        MemoryBroadcast { tx: self.tx.clone(), rx: Mutex::new(self.tx.subscribe()) }
    }

    /// Put raw bytes on the segment, as a foreign sender would.
    pub fn inject(&self, datagram: impl Into<Bytes>) {
        // No receivers is not an error on a broadcast segment
        let _ = self.tx.send(datagram.into());
    }
}

impl Default for MemorySegment {
    fn default() -> Self {
        Self::new(1024)
    }
}

/// One endpoint on a [`MemorySegment`].
#[derive(Debug)]
pub struct MemoryBroadcast {
    tx: broadcast::Sender<Bytes>,
    rx: Mutex<broadcast::Receiver<Bytes>>,
}

#[async_trait]
impl BroadcastTransport for MemoryBroadcast {
    async fn send(&self, packet: &Packet) -> io::Result<()> {
        let _ = self.tx.send(Bytes::copy_from_slice(packet.as_wire()));
        Ok(())
    }

    async fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        let mut rx = self.rx.lock().await;
        loop {
            match rx.recv().await {
                Ok(datagram) => {
                    let n = datagram.len().min(buf.len());
                    buf[..n].copy_from_slice(&datagram[..n]);
                    return Ok(n);
                },
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "memory segment receiver lagged");
                },
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(io::Error::new(io::ErrorKind::BrokenPipe, "segment closed"));
                },
            }
        }
    }
}
