//! Packet message types.

/// Discriminator carried in byte 1 of every [`crate::Packet`].
///
/// Routing does not look at the type: any current-version packet is split
/// into topic and message and fanned out. [`MessageType::Alive`] is reserved
/// for daemon heartbeats that nothing sends yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    /// A topic message published by a local client somewhere on the segment
    Publish = 0x01,
    /// Daemon liveness announcement (reserved)
    Alive = 0x02,
}

impl MessageType {
    /// Convert from the wire byte. Returns `None` for unknown values.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(Self::Publish),
            0x02 => Some(Self::Alive),
            _ => None,
        }
    }

    /// Wire byte for this type.
    pub fn to_u8(self) -> u8 {
        self as u8
    }
}
