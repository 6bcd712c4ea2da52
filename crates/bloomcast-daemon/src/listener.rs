//! Local client listener.
//!
//! Any bidirectional byte stream works for the client protocol, so accepted
//! connections are handed on as boxed [`ClientStream`]s regardless of the
//! socket family.

use std::{io, path::PathBuf};

use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpListener,
};
#[cfg(unix)]
use tokio::net::UnixListener;
#[cfg(unix)]
use tracing::{debug, warn};

use crate::{config::ListenAddr, error::DaemonError};

/// Byte stream to one local client.
pub trait ClientStream: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T> ClientStream for T where T: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

/// Listener for local clients.
#[derive(Debug)]
pub enum ClientListener {
    /// Unix domain socket; the path is removed again on [`ClientListener::cleanup`]
    #[cfg(unix)]
    Unix {
        /// Bound listener
        listener: UnixListener,
        /// Socket file
        path: PathBuf,
    },
    /// TCP socket
    Tcp(TcpListener),
}

impl ClientListener {
    /// Bind to `addr`. A stale Unix socket file is removed first.
    pub async fn bind(addr: &ListenAddr) -> Result<Self, DaemonError> {
        let bind_err = |source| DaemonError::Bind {
            what: "client listener",
            address: addr.to_string(),
            source,
        };

        match addr {
            #[cfg(unix)]
            ListenAddr::Unix(path) => {
                remove_stale_socket(path);
                let listener = UnixListener::bind(path).map_err(bind_err)?;
                Ok(Self::Unix { listener, path: path.clone() })
            },
            #[cfg(not(unix))]
            ListenAddr::Unix(_) => Err(bind_err(io::Error::new(
                io::ErrorKind::Unsupported,
                "unix sockets are not available on this platform",
            ))),
            ListenAddr::Tcp(socket_addr) => {
                TcpListener::bind(socket_addr).await.map(Self::Tcp).map_err(bind_err)
            },
        }
    }

    /// Address actually bound (resolves TCP port 0).
    pub fn local_addr(&self) -> io::Result<ListenAddr> {
        match self {
            #[cfg(unix)]
            Self::Unix { path, .. } => Ok(ListenAddr::Unix(path.clone())),
            Self::Tcp(listener) => listener.local_addr().map(ListenAddr::Tcp),
        }
    }

    /// Wait for the next client. Returns the stream and a peer description.
    pub async fn accept(&self) -> io::Result<(Box<dyn ClientStream>, String)> {
        match self {
            #[cfg(unix)]
            Self::Unix { listener, path } => {
                let (stream, _) = listener.accept().await?;
                Ok((Box::new(stream), format!("unix:{}", path.display())))
            },
            Self::Tcp(listener) => {
                let (stream, peer) = listener.accept().await?;
                Ok((Box::new(stream), format!("tcp:{peer}")))
            },
        }
    }

    /// Remove the Unix socket file, if any.
    pub fn cleanup(&self) {
        #[cfg(unix)]
        if let Self::Unix { path, .. } = self {
            remove_stale_socket(path);
        }
    }
}

#[cfg(unix)]
fn remove_stale_socket(path: &std::path::Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "removed socket file"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {},
        Err(e) => warn!(path = %path.display(), error = %e, "failed to remove socket file"),
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;

    #[tokio::test]
    async fn tcp_accepts_and_reports_port() {
        let listener = ClientListener::bind(&"tcp:127.0.0.1:0".parse().unwrap()).await.unwrap();
        let ListenAddr::Tcp(addr) = listener.local_addr().unwrap() else {
            unreachable!("tcp listener");
        };
        assert_ne!(addr.port(), 0);

        let mut client = tokio::net::TcpStream::connect(addr).await.unwrap();
        let (mut server, peer) = listener.accept().await.unwrap();
        assert!(peer.starts_with("tcp:127.0.0.1:"));

        client.write_all(b"PUB a|b").await.unwrap();
        let mut buf = [0u8; 16];
        let n = server.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"PUB a|b");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn unix_replaces_stale_socket_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bus.sock");
        std::fs::write(&path, b"stale").unwrap();

        let listener = ClientListener::bind(&ListenAddr::Unix(path.clone())).await.unwrap();
        let _client = tokio::net::UnixStream::connect(&path).await.unwrap();
        let (_server, peer) = listener.accept().await.unwrap();
        assert_eq!(peer, format!("unix:{}", path.display()));

        listener.cleanup();
        assert!(!path.exists());
    }
}
