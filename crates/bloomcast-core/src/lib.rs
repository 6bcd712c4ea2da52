//! Bloomcast core logic
//!
//! Everything between the sockets: per-client subscription filters, the
//! shared registry of connected clients, command dispatch and the fan-out
//! router. No sockets are opened here; the daemon supplies a
//! [`transport::BroadcastTransport`] and feeds frames from its client
//! connections.
//!
//! # Components
//!
//! - [`filter`]: Bloom-style subscription filter
//! - [`session`]: One connected client (filter, local topics, outbound queue)
//! - [`registry`]: Concurrent map of live sessions
//! - [`router`]: Inbound datagram validation and fan-out
//! - [`dispatch`]: `PUB`/`SUB` command handling
//! - [`transport`]: Broadcast transport abstraction and an in-memory segment
//! - [`error`]: Session and registry errors

pub mod dispatch;
pub mod error;
pub mod filter;
pub mod registry;
pub mod router;
pub mod session;
pub mod transport;

pub use dispatch::{DispatchOutcome, dispatch, publish};
pub use error::{DeliveryError, RegistryError, SessionError};
pub use filter::SubscriptionFilter;
pub use registry::ClientRegistry;
pub use router::{DropReason, RouteOutcome, Router};
pub use session::{ClientId, ClientSession, SessionState};
pub use transport::BroadcastTransport;
