//! Error types for sessions and the registry.

use bloomcast_proto::ProtocolError;
use thiserror::Error;

use crate::session::ClientId;

/// Errors from operations on a single client session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// `SUB` payload could not be read as filter parameters
    #[error("invalid filter parameters: {0}")]
    InvalidFilterParameters(#[source] ProtocolError),

    /// Session is already disconnected
    #[error("session is disconnected")]
    Disconnected,
}

/// Errors queueing a delivery for a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// Outbound queue is full, delivery dropped
    #[error("outbound queue full")]
    QueueFull,

    /// Writer side has gone away
    #[error("client connection closed")]
    Closed,
}

/// Errors from the client registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// A session with this id is already registered
    #[error("client {0} is already registered")]
    DuplicateClient(ClientId),
}
