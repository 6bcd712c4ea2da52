//! Client session state.
//!
//! # State Machine
//!
//! ```text
//! ┌───────────┐  SUB (valid)  ┌──────────┐
//! │ Connected │──────────────>│ Filtered │──┐ SUB (valid): filter replaced
//! └───────────┘               └──────────┘<─┘
//!       │                          │
//!       │ close / read error       │ close / read error
//!       ↓                          ↓
//!  ┌──────────────┐          ┌──────────────┐
//!  │ Disconnected │          │ Disconnected │
//!  └──────────────┘          └──────────────┘
//! ```
//!
//! A `Connected` session has no filter and matches nothing. A `Filtered`
//! session matches topics present in its filter. Once `Disconnected`, filter
//! updates fail, local adds are ignored and every topic test is negative.
//!
//! The filter and local topic list sit behind one reader-writer lock: the
//! connection task is the only writer, routing passes are readers.

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use bloomcast_proto::FilterParams;
use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{
    error::{DeliveryError, SessionError},
    filter::SubscriptionFilter,
};

/// Registry key for a connected client.
pub type ClientId = u64;

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Connected, no filter yet
    Connected,
    /// At least one successful filter update
    Filtered,
    /// Connection gone (terminal)
    Disconnected,
}

#[derive(Debug, Default)]
struct FilterState {
    filter: Option<SubscriptionFilter>,
    local_topics: Vec<Bytes>,
}

/// One connected local client.
#[derive(Debug)]
pub struct ClientSession {
    id: ClientId,
    peer: String,
    state: RwLock<FilterState>,
    outbound: mpsc::Sender<Bytes>,
    closed: CancellationToken,
}

impl ClientSession {
    /// Create a session that writes deliveries into `outbound`.
    pub fn new(id: ClientId, peer: impl Into<String>, outbound: mpsc::Sender<Bytes>) -> Self {
        Self {
            id,
            peer: peer.into(),
            state: RwLock::new(FilterState::default()),
            outbound,
            closed: CancellationToken::new(),
        }
    }

    /// Create a session together with the receiving end of its outbound
    /// queue, bounded at `depth` frames.
    pub fn with_queue(
        id: ClientId,
        peer: impl Into<String>,
        depth: usize,
    ) -> (Self, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(depth.max(1));
        (Self::new(id, peer, tx), rx)
    }

    /// Registry id.
    pub fn id(&self) -> ClientId {
        self.id
    }

    /// Peer description for logs.
    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        if self.is_closed() {
            return SessionState::Disconnected;
        }
        if self.read().filter.is_some() { SessionState::Filtered } else { SessionState::Connected }
    }

    /// Replace the filter from a raw `SUB` payload.
    ///
    /// On error the previous filter (if any) is left in place.
    pub fn update_filter(&self, payload: &[u8]) -> Result<FilterParams, SessionError> {
        if self.is_closed() {
            return Err(SessionError::Disconnected);
        }
        let params =
            FilterParams::decode(payload).map_err(SessionError::InvalidFilterParameters)?;
        let filter = SubscriptionFilter::new(params);
        let params = filter.params();
        self.write().filter = Some(filter);
        Ok(params)
    }

    /// Whether a delivery on `topic` should reach this client.
    pub fn test_topic(&self, topic: impl AsRef<[u8]>) -> bool {
        if self.is_closed() {
            return false;
        }
        self.read().filter.as_ref().is_some_and(|f| f.contains(topic.as_ref()))
    }

    /// Add `topic` to the current filter and record it locally.
    ///
    /// The topic is recorded even when no filter exists yet, but it only
    /// becomes matchable once added to an allocated filter.
    pub fn add_topic_locally(&self, topic: impl AsRef<[u8]>) {
        if self.is_closed() {
            return;
        }
        let topic = topic.as_ref();
        let mut state = self.write();
        state.local_topics.push(Bytes::copy_from_slice(topic));
        if let Some(filter) = state.filter.as_mut() {
            filter.add(topic);
        }
    }

    /// Topics added through [`Self::add_topic_locally`], in insertion order.
    pub fn local_topics(&self) -> Vec<Bytes> {
        self.read().local_topics.clone()
    }

    /// Current filter dimensions, `None` before the first `SUB`.
    pub fn filter_params(&self) -> Option<FilterParams> {
        self.read().filter.as_ref().map(SubscriptionFilter::params)
    }

    /// Queue a frame for the connection's writer. Never blocks.
    pub fn deliver(&self, frame: Bytes) -> Result<(), DeliveryError> {
        if self.is_closed() {
            return Err(DeliveryError::Closed);
        }
        self.outbound.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }

    /// Mark the session disconnected and wake its connection task.
    pub fn close(&self) {
        self.closed.cancel();
    }

    /// Whether [`Self::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Token cancelled when the session closes.
    pub fn closed_token(&self) -> CancellationToken {
        self.closed.clone()
    }

    fn read(&self) -> RwLockReadGuard<'_, FilterState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, FilterState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}
