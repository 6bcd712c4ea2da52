//! Daemon lifecycle: bind, run the two long-lived loops, shut down.

use std::{io, sync::Arc};

use bloomcast_core::{BroadcastTransport, ClientRegistry, Router};
use tokio::task::JoinHandle;
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{info, warn};

use crate::{
    config::{DaemonConfig, ListenAddr},
    connection::{self, ConnectionContext},
    error::DaemonError,
    listener::ClientListener,
    udp::UdpBroadcast,
};

/// A running daemon.
///
/// Owns the client registry and the broadcast transport. Dropping a
/// `Daemon` without calling [`Daemon::shutdown`] leaves its tasks running
/// until the runtime stops.
pub struct Daemon<T: BroadcastTransport = UdpBroadcast> {
    registry: Arc<ClientRegistry>,
    transport: Arc<T>,
    listen_addr: ListenAddr,
    cancel: CancellationToken,
    connections: TaskTracker,
    accept_task: JoinHandle<ClientListener>,
    routing_task: JoinHandle<()>,
}

impl Daemon<UdpBroadcast> {
    /// Bind the client listener and the UDP broadcast socket and start
    /// serving. Bind failures are fatal.
    pub async fn start(config: DaemonConfig) -> Result<Self, DaemonError> {
        let listener = ClientListener::bind(&config.listen).await?;
        let transport = match UdpBroadcast::bind(config.udp_bind, config.broadcast_addr) {
            Ok(transport) => transport,
            Err(e) => {
                listener.cleanup();
                return Err(e);
            },
        };
        let udp = or_cleanup(&listener, transport.local_addr())?;
        info!(%udp, broadcast = %transport.destination(), "broadcast socket ready");
        Self::spawn(&config, listener, Arc::new(transport))
    }
}

impl<T: BroadcastTransport> Daemon<T> {
    /// Start with a caller-supplied broadcast transport.
    pub async fn with_transport(config: DaemonConfig, transport: Arc<T>) -> Result<Self, DaemonError> {
        let listener = ClientListener::bind(&config.listen).await?;
        Self::spawn(&config, listener, transport)
    }

    fn spawn(
        config: &DaemonConfig,
        listener: ClientListener,
        transport: Arc<T>,
    ) -> Result<Self, DaemonError> {
        let listen_addr = or_cleanup(&listener, listener.local_addr())?;
        info!(listen = %listen_addr, "client listener ready");

        let registry = Arc::new(ClientRegistry::new());
        let cancel = CancellationToken::new();
        let connections = TaskTracker::new();

        let ctx = Arc::new(ConnectionContext {
            registry: Arc::clone(&registry),
            transport: Arc::clone(&transport),
            read_buffer_size: config.read_buffer_size,
            outbound_queue: config.outbound_queue,
            shutdown: cancel.clone(),
        });
        let accept_task =
            tokio::spawn(accept_loop(listener, ctx, connections.clone(), cancel.clone()));

        let routing_task = {
            let router = Router::new(Arc::clone(&registry));
            let transport = Arc::clone(&transport);
            let cancel = cancel.clone();
            tokio::spawn(async move { router.run(transport.as_ref(), cancel).await })
        };

        Ok(Self {
            registry,
            transport,
            listen_addr,
            cancel,
            connections,
            accept_task,
            routing_task,
        })
    }

    /// Registry of connected clients.
    pub fn registry(&self) -> &Arc<ClientRegistry> {
        &self.registry
    }

    /// Broadcast transport in use.
    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// Address clients connect to (TCP port 0 resolved).
    pub fn listen_addr(&self) -> &ListenAddr {
        &self.listen_addr
    }

    /// Stop accepting, stop routing, close every client and wait for all
    /// connection tasks to finish.
    pub async fn shutdown(self) {
        info!("shutting down daemon");
        self.cancel.cancel();

        let listener = match self.accept_task.await {
            Ok(listener) => Some(listener),
            Err(e) => {
                warn!(error = %e, "accept task failed");
                None
            },
        };
        if let Err(e) = self.routing_task.await {
            warn!(error = %e, "routing task failed");
        }

        let sessions = self.registry.drain();
        info!(clients = sessions.len(), "closing client connections");
        for session in sessions {
            session.close();
        }
        self.connections.close();
        self.connections.wait().await;

        if let Some(listener) = listener {
            listener.cleanup();
        }
        info!("daemon shutdown complete");
    }
}

/// Pass `result` through, removing the listener's socket file on error.
fn or_cleanup<V>(listener: &ClientListener, result: io::Result<V>) -> Result<V, DaemonError> {
    result.map_err(|e| {
        listener.cleanup();
        e.into()
    })
}

async fn accept_loop<T>(
    listener: ClientListener,
    ctx: Arc<ConnectionContext<T>>,
    connections: TaskTracker,
    cancel: CancellationToken,
) -> ClientListener
where
    T: BroadcastTransport,
{
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            result = listener.accept() => match result {
                Ok((stream, peer)) => {
                    connections.spawn(connection::serve(stream, peer, Arc::clone(&ctx)));
                },
                Err(e) => {
                    if cancel.is_cancelled() {
                        break;
                    }
                    warn!(error = %e, "accept failed");
                },
            },
        }
    }
    listener
}
