//! Bloomcast daemon.
//!
//! Accepts local clients over a Unix or TCP stream socket, broadcasts their
//! publishes as 64-byte UDP datagrams, and fans inbound datagrams out to
//! local subscribers. Each daemon is independent; any number of them can
//! share a broadcast domain.
//!
//! # Tasks
//!
//! - accept loop: one task, spawns a connection task per client
//! - routing loop: one task, receives datagrams and runs the router
//! - connection tasks: read and dispatch commands, plus a writer task that
//!   drains the client's outbound queue
//!
//! Shutdown cancels both loops, closes every registered connection, and
//! waits for all connection tasks to finish.

pub mod config;
pub mod connection;
pub mod daemon;
pub mod error;
pub mod listener;
pub mod udp;

pub use config::{DaemonConfig, ListenAddr};
pub use daemon::Daemon;
pub use error::DaemonError;
pub use listener::ClientListener;
pub use udp::UdpBroadcast;
