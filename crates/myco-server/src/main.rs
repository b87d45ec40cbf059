//! Myco gossip node daemon binary.
//!
//! # Usage
//!
//! ```bash
//! # Start with defaults, reading MYCO_* environment variables
//! myco-server
//!
//! # Start with a TOML config overlay
//! myco-server --config /etc/myco/myco.toml
//! ```

use std::sync::Arc;

use clap::Parser;
use myco_core::{Node, NodeConfig, NodeIdentity, NodeLimits, PeerTable};
use myco_crypto::{EpochKeys, Metrics};
use myco_server::{
    config::Config, executor::NoopExecutor, peer_list, persistence, runtime::RuntimeConfig, Daemon,
    PlaintextPolicy, ServerError, UdpTransport,
};
use rand::{rngs::StdRng, SeedableRng};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Myco gossip/replication node daemon.
#[derive(Parser, Debug)]
#[command(name = "myco-server")]
#[command(about = "Decentralized gossip/replication daemon for service catalog distribution")]
#[command(version)]
struct Args {
    /// Path to a TOML configuration overlay.
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,

    /// Path to the peer list file (defaults to `<state_dir>/peers.txt`).
    #[arg(long)]
    peers: Option<std::path::PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,
}

const LOG_CAPACITY: usize = 1 << 20;
const SNAPSHOT_CAPACITY: usize = 1 << 19;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("myco-server starting");

    let config = match &args.config {
        Some(path) => Config::from_env()?.merge_file(path)?,
        None => Config::from_env()?,
    };

    if let Err(error) = run(config, args).await {
        tracing::error!(%error, "daemon exited");
        return Err(error.into());
    }
    Ok(())
}

async fn run(config: Config, args: Args) -> Result<(), ServerError> {
    let identity = NodeIdentity {
        public_key: config.public_key_bytes()?,
        node_id: config.node_id,
        zone_id: config.zone_id,
    };

    let peers_path = args.peers.unwrap_or_else(|| config.state_dir.join("peers.txt"));
    let peers = if peers_path.exists() {
        peer_list::load(&peers_path).map_err(|error| ServerError::Persistence {
            path: peers_path.clone(),
            source: std::io::Error::other(error),
        })?
    } else {
        tracing::warn!(path = %peers_path.display(), "no peer list found, starting with an empty peer table");
        Vec::new()
    };
    let peer_table = Arc::new(PeerTable::new(peers));

    let wal = persistence::load(&config.state_dir, LOG_CAPACITY, SNAPSHOT_CAPACITY)?;
    let gossip_psk = config.gossip_psk_bytes()?;
    let metrics = Arc::new(Metrics::default());

    // The Node seals outbound packets with its own EpochKeys; the
    // transport opens inbound ones with a second instance behind a
    // mutex so a future epoch rotation can update both independently.
    let node_config = NodeConfig {
        identity,
        gossip_psk: gossip_psk.clone(),
        gossip_fanout: config.gossip_fanout,
        limits: NodeLimits::default(),
    };
    let node: Node<StdRng> = Node::new(
        node_config,
        Arc::clone(&peer_table),
        wal,
        EpochKeys::new(config.packet_epoch, config.packet_epoch_prev),
        Arc::clone(&metrics),
        StdRng::from_entropy(),
    );

    let bind_addr: std::net::SocketAddr = format!("0.0.0.0:{}", config.udp_port)
        .parse()
        .map_err(|_| myco_core::NodeError::Config("invalid udp_port"))?;
    let policy =
        PlaintextPolicy { allow_plaintext: config.allow_plaintext, force_plaintext: config.force_plaintext };
    let transport = UdpTransport::bind(
        bind_addr,
        Arc::clone(&peer_table),
        Arc::new(tokio::sync::Mutex::new(EpochKeys::new(config.packet_epoch, config.packet_epoch_prev))),
        gossip_psk,
        policy,
        metrics,
    )
    .await?;

    tracing::info!(addr = %transport.local_addr(), node_id = config.node_id, "bound UDP transport");

    let daemon = Daemon::new(node, transport, NoopExecutor, config.state_dir.clone(), RuntimeConfig::default());
    daemon.run().await
}
