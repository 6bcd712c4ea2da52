//! Daemon configuration.

use std::{
    fmt,
    net::{Ipv4Addr, SocketAddr, SocketAddrV4},
    path::PathBuf,
    str::FromStr,
};

use crate::error::DaemonError;

/// Default UDP port shared by every daemon on the segment.
pub const DEFAULT_UDP_PORT: u16 = 9876;

/// Default Unix socket path for local clients.
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/pubsub.sock";

/// Default size of a single client read (one read is one command frame).
pub const DEFAULT_READ_BUFFER_SIZE: usize = 1024;

/// Default per-client outbound queue depth.
pub const DEFAULT_OUTBOUND_QUEUE: usize = 64;

/// Where local clients connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenAddr {
    /// Unix domain socket at this path
    Unix(PathBuf),
    /// TCP socket
    Tcp(SocketAddr),
}

impl FromStr for ListenAddr {
    type Err = DaemonError;

    /// Accepts `unix:<path>`, `tcp:<addr>` (with or without `//`), or a bare
    /// filesystem path.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || DaemonError::InvalidListenAddr(s.to_owned());

        if let Some(rest) = s.strip_prefix("tcp:") {
            let rest = rest.strip_prefix("//").unwrap_or(rest);
            return rest.parse().map(Self::Tcp).map_err(|_| invalid());
        }
        if let Some(rest) = s.strip_prefix("unix:") {
            let rest = rest.strip_prefix("//").unwrap_or(rest);
            if rest.is_empty() {
                return Err(invalid());
            }
            return Ok(Self::Unix(PathBuf::from(rest)));
        }
        if s.is_empty() {
            return Err(invalid());
        }
        Ok(Self::Unix(PathBuf::from(s)))
    }
}

impl fmt::Display for ListenAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unix(path) => write!(f, "unix:{}", path.display()),
            Self::Tcp(addr) => write!(f, "tcp:{addr}"),
        }
    }
}

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Local client listener
    pub listen: ListenAddr,
    /// Address the broadcast socket binds to
    pub udp_bind: SocketAddr,
    /// Destination for outgoing packets
    pub broadcast_addr: SocketAddr,
    /// Bytes read per client frame
    pub read_buffer_size: usize,
    /// Deliveries buffered per client before drops
    pub outbound_queue: usize,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            listen: ListenAddr::Unix(PathBuf::from(DEFAULT_SOCKET_PATH)),
            udp_bind: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, DEFAULT_UDP_PORT)),
            broadcast_addr: SocketAddr::V4(SocketAddrV4::new(
                Ipv4Addr::BROADCAST,
                DEFAULT_UDP_PORT,
            )),
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            outbound_queue: DEFAULT_OUTBOUND_QUEUE,
        }
    }
}
