//! UDP broadcast transport.
//!
//! One socket both sends to the broadcast destination and receives from the
//! shared port. `SO_REUSEADDR`/`SO_REUSEPORT` let several daemons on one
//! host bind the same port; `SO_BROADCAST` is required to send to
//! `255.255.255.255`.

use std::{io, net::SocketAddr};

use async_trait::async_trait;
use bloomcast_core::BroadcastTransport;
use bloomcast_proto::Packet;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;

use crate::error::DaemonError;

/// UDP socket plus fixed broadcast destination.
#[derive(Debug)]
pub struct UdpBroadcast {
    socket: UdpSocket,
    destination: SocketAddr,
}

impl UdpBroadcast {
    /// Bind the broadcast socket.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn bind(bind: SocketAddr, destination: SocketAddr) -> Result<Self, DaemonError> {
        let socket = create_broadcast_socket(bind).map_err(|source| DaemonError::Bind {
            what: "broadcast socket",
            address: bind.to_string(),
            source,
        })?;
        Ok(Self { socket, destination })
    }

    /// Address the socket is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Where packets are sent.
    pub fn destination(&self) -> SocketAddr {
        self.destination
    }
}

#[async_trait]
impl BroadcastTransport for UdpBroadcast {
    async fn send(&self, packet: &Packet) -> io::Result<()> {
        self.socket.send_to(packet.as_wire(), self.destination).await.map(|_| ())
    }

    async fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        self.socket.recv_from(buf).await.map(|(n, _)| n)
    }
}

fn create_broadcast_socket(addr: SocketAddr) -> io::Result<UdpSocket> {
    let domain = if addr.is_ipv4() { Domain::IPV4 } else { Domain::IPV6 };
    let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;

    socket.set_reuse_address(true)?;
    #[cfg(unix)]
    socket.set_reuse_port(true)?;
    if addr.is_ipv4() {
        socket.set_broadcast(true)?;
    }

    socket.bind(&addr.into())?;
    socket.set_nonblocking(true)?;

    let std_socket: std::net::UdpSocket = socket.into();
    UdpSocket::from_std(std_socket)
}
