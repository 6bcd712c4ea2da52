//! Per-client connection task.
//!
//! A connection registers its session, then runs a read loop that treats
//! each read as one command frame. A separate writer task drains the
//! session's outbound queue. Either side failing closes the session, which
//! stops the other. The session is removed from the registry before the
//! task returns.

use std::sync::Arc;

use bloomcast_core::{BroadcastTransport, ClientRegistry, ClientSession, dispatch};
use bytes::Bytes;
use tokio::{
    io::{AsyncReadExt, AsyncWrite, AsyncWriteExt},
    sync::mpsc,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::listener::ClientStream;

/// Shared state every connection task needs.
#[derive(Debug)]
pub struct ConnectionContext<T: ?Sized> {
    /// Live sessions
    pub registry: Arc<ClientRegistry>,
    /// Where publishes go
    pub transport: Arc<T>,
    /// Bytes per read (one read is one frame)
    pub read_buffer_size: usize,
    /// Outbound queue depth per client
    pub outbound_queue: usize,
    /// Cancelled when the daemon shuts down
    pub shutdown: CancellationToken,
}

/// Serve one client until it disconnects or its session is closed.
pub async fn serve<T>(stream: Box<dyn ClientStream>, peer: String, ctx: Arc<ConnectionContext<T>>)
where
    T: BroadcastTransport + ?Sized,
{
    let id = ctx.registry.next_id();
    let (session, outbound) = ClientSession::with_queue(id, peer, ctx.outbound_queue);
    let session = Arc::new(session);

    if let Err(e) = ctx.registry.add(id, Arc::clone(&session)) {
        warn!(client_id = id, error = %e, "failed to register client");
        return;
    }
    info!(client_id = id, peer = %session.peer(), "client connected");

    let (mut reader, writer) = tokio::io::split(stream);
    let writer_task = tokio::spawn(write_loop(writer, outbound, Arc::clone(&session)));

    let closed = session.closed_token();
    let mut buf = vec![0u8; ctx.read_buffer_size.max(1)];
    loop {
        tokio::select! {
            () = closed.cancelled() => break,
            () = ctx.shutdown.cancelled() => break,
            result = reader.read(&mut buf) => match result {
                Ok(0) => break,
                Ok(n) => {
                    dispatch(&session, &buf[..n], ctx.transport.as_ref()).await;
                },
                Err(e) => {
                    debug!(client_id = id, error = %e, "client read failed");
                    break;
                },
            },
        }
    }

    ctx.registry.remove(id);
    session.close();
    if let Err(e) = writer_task.await {
        warn!(client_id = id, error = %e, "client writer task failed");
    }
    info!(client_id = id, peer = %session.peer(), "client disconnected");
}

async fn write_loop<W>(mut writer: W, mut outbound: mpsc::Receiver<Bytes>, session: Arc<ClientSession>)
where
    W: AsyncWrite + Unpin,
{
    let closed = session.closed_token();
    loop {
        tokio::select! {
            () = closed.cancelled() => break,
            frame = outbound.recv() => {
                let Some(frame) = frame else { break };
                if let Err(e) = writer.write_all(&frame).await {
                    debug!(client_id = session.id(), error = %e, "client write failed");
                    session.close();
                    break;
                }
            },
        }
    }
    let _ = writer.shutdown().await;
}

#[cfg(test)]
mod tests {
    use std::{
        io,
        pin::Pin,
        task::{Context, Poll},
        time::Duration,
    };

    use bloomcast_core::{Router, SessionState, transport::MemorySegment};
    use bloomcast_proto::{Delivery, FilterParams};
    use tokio::io::{AsyncRead, ReadBuf, duplex};

    use super::*;

    fn context(segment: &MemorySegment) -> Arc<ConnectionContext<bloomcast_core::transport::MemoryBroadcast>> {
        Arc::new(ConnectionContext {
            registry: Arc::new(ClientRegistry::new()),
            transport: Arc::new(segment.attach()),
            read_buffer_size: 1024,
            outbound_queue: 8,
            shutdown: CancellationToken::new(),
        })
    }

    /// Client that never sends and whose every write fails.
    struct BrokenPipe;

    impl AsyncRead for BrokenPipe {
        fn poll_read(self: Pin<&mut Self>, _cx: &mut Context<'_>, _buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
            Poll::Pending
        }
    }

    impl AsyncWrite for BrokenPipe {
        fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, _buf: &[u8]) -> Poll<io::Result<usize>> {
            Poll::Ready(Err(io::ErrorKind::BrokenPipe.into()))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    fn subscribe(session: &ClientSession, topic: &str) {
        session.update_filter(&FilterParams::new(1000, 4).to_bytes()).unwrap();
        session.add_topic_locally(topic);
    }

    async fn wait_for<F: Fn() -> bool>(cond: F) {
        for _ in 0..100 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(cond(), "condition not reached");
    }

    #[tokio::test]
    async fn registers_and_removes_on_eof() {
        let segment = MemorySegment::default();
        let ctx = context(&segment);
        let (client, server) = duplex(1024);

        let task = tokio::spawn(serve(Box::new(server), "test".into(), Arc::clone(&ctx)));
        wait_for(|| ctx.registry.len() == 1).await;

        drop(client);
        task.await.unwrap();
        assert!(ctx.registry.is_empty());
    }

    #[tokio::test]
    async fn subscribe_frame_updates_session() {
        let segment = MemorySegment::default();
        let ctx = context(&segment);
        let (mut client, server) = duplex(1024);
        let task = tokio::spawn(serve(Box::new(server), "test".into(), Arc::clone(&ctx)));
        wait_for(|| ctx.registry.len() == 1).await;
        let id = ctx.registry.ids()[0];
        let session = ctx.registry.get(id).unwrap();

        client.write_all(&FilterParams::new(1000, 4).to_frame()).await.unwrap();
        wait_for(|| session.state() == SessionState::Filtered).await;

        drop(client);
        task.await.unwrap();
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn closing_session_ends_task() {
        let segment = MemorySegment::default();
        let ctx = context(&segment);
        let (_client, server) = duplex(1024);
        let task = tokio::spawn(serve(Box::new(server), "test".into(), Arc::clone(&ctx)));
        wait_for(|| ctx.registry.len() == 1).await;

        for session in ctx.registry.drain() {
            session.close();
        }
        tokio::time::timeout(Duration::from_secs(1), task).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn shutdown_token_ends_task() {
        let segment = MemorySegment::default();
        let ctx = context(&segment);
        let (_client, server) = duplex(1024);
        let task = tokio::spawn(serve(Box::new(server), "test".into(), Arc::clone(&ctx)));
        wait_for(|| ctx.registry.len() == 1).await;

        ctx.shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), task).await.unwrap().unwrap();
        assert!(ctx.registry.is_empty());
    }

    #[tokio::test]
    async fn deliveries_are_written_to_client() {
        let segment = MemorySegment::default();
        let ctx = context(&segment);
        let (mut client, server) = duplex(1024);
        let task = tokio::spawn(serve(Box::new(server), "test".into(), Arc::clone(&ctx)));
        wait_for(|| ctx.registry.len() == 1).await;
        let session = ctx.registry.get(ctx.registry.ids()[0]).unwrap();

        session.deliver(Bytes::from_static(b"MSG a|b")).unwrap();
        let mut buf = [0u8; 32];
        let n = client.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"MSG a|b");

        drop(client);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn write_failure_disconnects_only_that_client() {
        let segment = MemorySegment::default();
        let ctx = context(&segment);

        let broken_task = tokio::spawn(serve(Box::new(BrokenPipe), "broken".into(), Arc::clone(&ctx)));
        wait_for(|| ctx.registry.len() == 1).await;
        let broken_id = ctx.registry.ids()[0];
        let broken = ctx.registry.get(broken_id).unwrap();

        let (mut client, server) = duplex(1024);
        let healthy_task = tokio::spawn(serve(Box::new(server), "healthy".into(), Arc::clone(&ctx)));
        wait_for(|| ctx.registry.len() == 2).await;
        let healthy_id = ctx.registry.ids().into_iter().find(|&id| id != broken_id).unwrap();
        let healthy = ctx.registry.get(healthy_id).unwrap();

        subscribe(&broken, "t");
        subscribe(&healthy, "t");
        let router = Router::new(Arc::clone(&ctx.registry));
        assert_eq!(router.fanout(&Delivery::new("t", "m")), (2, 2));

        tokio::time::timeout(Duration::from_secs(1), broken_task).await.unwrap().unwrap();
        assert_eq!(broken.state(), SessionState::Disconnected);
        assert!(ctx.registry.get(broken_id).is_none());
        assert_eq!(ctx.registry.len(), 1);

        let mut buf = [0u8; 32];
        let n = client.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"MSG t|m");

        assert_eq!(router.fanout(&Delivery::new("t", "m2")), (1, 1));
        let n = client.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"MSG t|m2");
        assert_eq!(healthy.state(), SessionState::Filtered);

        drop(client);
        healthy_task.await.unwrap();
    }
}
