//! bloomcastd: local pub/sub over UDP broadcast.
//!
//! Log level comes from `BLOOMCAST_LOG`, falling back to `RUST_LOG` and then
//! `info`.

use std::net::SocketAddr;

use bloomcast_daemon::{
    Daemon, DaemonConfig, ListenAddr,
    config::{DEFAULT_OUTBOUND_QUEUE, DEFAULT_READ_BUFFER_SIZE, DEFAULT_SOCKET_PATH},
};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "bloomcastd", version, about = "Pub/sub daemon over UDP broadcast")]
struct Args {
    /// Client listener: `unix:<path>`, `tcp:<addr>`, or a bare socket path
    #[arg(long, default_value = DEFAULT_SOCKET_PATH)]
    listen: ListenAddr,

    /// Local address for the broadcast socket
    #[arg(long, default_value = "0.0.0.0:9876")]
    udp_bind: SocketAddr,

    /// Destination for outgoing datagrams
    #[arg(long, default_value = "255.255.255.255:9876")]
    broadcast_addr: SocketAddr,

    /// Bytes read per client command frame
    #[arg(long, default_value_t = DEFAULT_READ_BUFFER_SIZE)]
    read_buffer_size: usize,

    /// Deliveries queued per client before new ones are dropped
    #[arg(long, default_value_t = DEFAULT_OUTBOUND_QUEUE)]
    outbound_queue: usize,
}

impl From<Args> for DaemonConfig {
    fn from(args: Args) -> Self {
        Self {
            listen: args.listen,
            udp_bind: args.udp_bind,
            broadcast_addr: args.broadcast_addr,
            read_buffer_size: args.read_buffer_size,
            outbound_queue: args.outbound_queue,
        }
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env("BLOOMCAST_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result,
        _ = terminate.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = DaemonConfig::from(Args::parse());
    info!(listen = %config.listen, udp = %config.udp_bind, "starting bloomcastd");

    let daemon = Daemon::start(config).await.map_err(|e| {
        error!(error = %e, "failed to start daemon");
        e
    })?;

    if let Err(e) = wait_for_signal().await {
        error!(error = %e, "failed to wait for shutdown signal");
    }
    daemon.shutdown().await;
    Ok(())
}
