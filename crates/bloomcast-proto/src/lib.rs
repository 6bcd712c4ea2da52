//! Wire format for the bloomcast bus.
//!
//! Two encodings live here. The broadcast side is a fixed 64-byte datagram
//! ([`Packet`]) that every daemon on the segment receives. The local side is
//! a small text protocol spoken over a stream socket: clients send
//! [`Command`] frames (`PUB`, `SUB`) and receive unsolicited [`Delivery`]
//! frames (`MSG`).
//!
//! # Packet layout
//!
//! ```text
//! offset 0      version       (1 byte, always 0x01)
//! offset 1      message type  (1 byte, see MessageType)
//! offset 2      topic length  (1 byte)
//! offset 3..64  payload       ("topic|message", null padded, truncated)
//! ```
//!
//! The header is all single bytes, so the packet layout is checked by
//! `zerocopy` at compile time and parsing never touches unsafe code.
#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod command;
pub mod delivery;
pub mod errors;
pub mod message_type;
pub mod packet;

pub use command::{Command, FilterParams};
pub use delivery::Delivery;
pub use errors::{ProtocolError, Result};
pub use message_type::MessageType;
pub use packet::{PAYLOAD_SIZE, PROTOCOL_VERSION, PACKET_SIZE, Packet};
