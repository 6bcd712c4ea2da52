//! Connection to a local daemon.

#[cfg(unix)]
use std::path::Path;

use bloomcast_proto::{Command, Delivery, FilterParams, PAYLOAD_SIZE};
use bytes::Bytes;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::{TcpStream, ToSocketAddrs},
};
#[cfg(unix)]
use tokio::net::UnixStream;
use tracing::{debug, warn};

use crate::{
    error::{ClientError, Result},
    topic_filter::TopicFilter,
};

/// Bytes read per delivery frame. Matches the daemon's client read size.
pub const READ_BUFFER_SIZE: usize = 1024;

/// Build a `PUB` frame whose `topic|message` payload fits one packet.
///
/// An oversized message is cut at the last character boundary that fits.
/// Fails only when the topic itself leaves no room.
pub fn publish_frame(topic: &str, message: &str) -> Result<Bytes> {
    let mut message = message;
    if topic.len() + 1 + message.len() > PAYLOAD_SIZE {
        let prefix = topic.len() + 1;
        if prefix >= PAYLOAD_SIZE {
            return Err(ClientError::TopicTooLong { len: topic.len(), max: PAYLOAD_SIZE - 2 });
        }
        let mut end = PAYLOAD_SIZE - prefix;
        while !message.is_char_boundary(end) {
            end -= 1;
        }
        message = &message[..end];
    }
    Ok(Command::Publish {
        topic: Bytes::copy_from_slice(topic.as_bytes()),
        message: Bytes::copy_from_slice(message.as_bytes()),
    }
    .to_frame())
}

/// A client connected to a bloomcast daemon.
///
/// Each call writes exactly one frame, and [`PubSubClient::recv`] treats each
/// read as one delivery.
#[derive(Debug)]
pub struct PubSubClient<S> {
    stream: S,
    buf: Vec<u8>,
}

#[cfg(unix)]
impl PubSubClient<UnixStream> {
    /// Connect over a Unix domain socket.
    pub async fn connect_unix(path: impl AsRef<Path>) -> Result<Self> {
        let stream = UnixStream::connect(path.as_ref()).await?;
        debug!(path = %path.as_ref().display(), "connected to daemon");
        Ok(Self::new(stream))
    }
}

impl PubSubClient<TcpStream> {
    /// Connect over TCP.
    pub async fn connect_tcp(addr: impl ToSocketAddrs) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        debug!(peer = ?stream.peer_addr().ok(), "connected to daemon");
        Ok(Self::new(stream))
    }
}

impl<S> PubSubClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap an established stream.
    pub fn new(stream: S) -> Self {
        Self { stream, buf: vec![0; READ_BUFFER_SIZE] }
    }

    /// Publish `message` on `topic`, truncating the message to fit.
    pub async fn publish(&mut self, topic: &str, message: &str) -> Result<()> {
        let frame = publish_frame(topic, message)?;
        self.stream.write_all(&frame).await?;
        Ok(())
    }

    /// Send the filter's dimensions as a `SUB` frame.
    pub async fn subscribe(&mut self, filter: &TopicFilter) -> Result<FilterParams> {
        let params = filter.params();
        self.stream.write_all(&params.to_frame()).await?;
        debug!(bit_size = params.bit_size, hash_count = params.hash_count, "sent subscription");
        Ok(params)
    }

    /// Wait for the next delivery. Frames without the `MSG ` prefix are
    /// skipped.
    pub async fn recv(&mut self) -> Result<Delivery> {
        loop {
            let n = self.stream.read(&mut self.buf).await?;
            if n == 0 {
                return Err(ClientError::Closed);
            }
            match Delivery::parse(&self.buf[..n]) {
                Some(delivery) => return Ok(delivery),
                None => warn!(len = n, "ignoring unexpected frame from daemon"),
            }
        }
    }

    /// Flush and close the write half.
    pub async fn close(&mut self) -> Result<()> {
        self.stream.shutdown().await?;
        Ok(())
    }

    /// Underlying stream.
    pub fn into_inner(self) -> S {
        self.stream
    }
}
