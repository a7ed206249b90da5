mod events;
mod http;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use colibri::store::PeriodStoreConfig;
use colibri::zk::{ZkProver, ZkProverConfig};
use colibri::{NodePool, NodePoolConfig, PeriodStore};

#[derive(Parser, Debug)]
#[command(name = "colibri-server")]
#[command(about = "Stateless Ethereum proof service")]
struct Args {
    /// Chain ID (1 for mainnet, 11155111 for Sepolia)
    #[arg(long, env = "CHAIN_ID", default_value = "1")]
    chain_id: u64,

    /// Listen port for the HTTP surface
    #[arg(long, env = "PORT", default_value = "8090")]
    port: u16,

    /// Base directory of the period store; unset disables it
    #[arg(long, env = "PERIOD_STORE")]
    period_store: Option<PathBuf>,

    /// Master instance URL; configures this instance as a mirroring slave
    #[arg(long, env = "PERIOD_MASTER_URL")]
    period_master_url: Option<String>,

    /// Backfill window in periods behind the head (0 disables)
    #[arg(long, env = "PERIOD_BACKFILL_MAX_PERIODS", default_value = "2")]
    period_backfill_max_periods: u32,

    /// Pacing between backfill header fetches in milliseconds
    #[arg(long, env = "PERIOD_BACKFILL_DELAY_MS", default_value = "0")]
    period_backfill_delay_ms: u64,

    /// SP1 network private key file; enables local proving
    #[arg(long, env = "PERIOD_PROVER_KEY_FILE")]
    period_prover_key_file: Option<PathBuf>,

    /// Run a full sync from the master on startup
    #[arg(long, env = "PERIOD_FULL_SYNC")]
    period_full_sync: bool,

    /// Subscribe to the beacon event stream (head + finality)
    #[arg(long, env = "STREAM_BEACON_EVENTS")]
    stream_beacon_events: bool,

    /// Directory with the guest prover ELF artifacts
    #[arg(long, env = "ZK_PROOFS_DIR")]
    zk_proofs_dir: Option<PathBuf>,

    /// Passed through to the RPC proxy layer, unused by the core
    #[arg(long, env = "ETH_LOGS_CACHE_BLOCKS", default_value = "0")]
    eth_logs_cache_blocks: u32,

    /// Optional memcached endpoint (opaque to the core)
    #[arg(long, env = "MEMCACHED_HOST")]
    memcached_host: Option<String>,

    #[arg(long, env = "MEMCACHED_PORT")]
    memcached_port: Option<u16>,

    #[arg(long, env = "MEMCACHED_POOL")]
    memcached_pool: Option<u32>,

    /// Execution RPC endpoints, comma separated (max 16)
    #[arg(long, env = "RPC_NODES", value_delimiter = ',')]
    rpc_nodes: Vec<String>,

    /// Beacon API endpoints, comma separated (max 16)
    #[arg(long, env = "BEACON_NODES", value_delimiter = ',')]
    beacon_nodes: Vec<String>,

    /// Prover endpoints, comma separated (max 16)
    #[arg(long, env = "PROVER_NODES", value_delimiter = ',')]
    prover_nodes: Vec<String>,
}

#[derive(Clone)]
pub struct AppState {
    pub chain_id: u64,
    pub pool: Arc<NodePool>,
    pub store: Option<PeriodStore>,
    pub prover: Option<Arc<ZkProver>>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    info!(chain_id = args.chain_id, port = args.port, "starting colibri server");
    if args.memcached_host.is_some() {
        info!(
            port = args.memcached_port,
            pool = args.memcached_pool,
            "memcached configured; the proof core does not use it"
        );
    }
    if args.eth_logs_cache_blocks > 0 {
        info!(
            blocks = args.eth_logs_cache_blocks,
            "log cache setting passed through to the rpc layer"
        );
    }

    let pool_config = NodePoolConfig::new(args.chain_id)
        .with_beacon(args.beacon_nodes.clone())
        .with_exec(args.rpc_nodes.clone())
        .with_prover(args.prover_nodes.clone());
    let pool = Arc::new(NodePool::new(pool_config));

    let store = match &args.period_store {
        Some(base) => {
            let mut cfg = PeriodStoreConfig::new(base, args.chain_id);
            cfg.backfill_max_periods = args.period_backfill_max_periods;
            cfg.backfill_delay_ms = args.period_backfill_delay_ms;
            cfg.master_url = args.period_master_url.clone();
            Some(PeriodStore::new(cfg, pool.clone())?)
        }
        None => None,
    };

    let prover = store.as_ref().map(|store| {
        Arc::new(ZkProver::new(
            store.clone(),
            pool.clone(),
            ZkProverConfig {
                key_file: args.period_prover_key_file.clone(),
                elf_path: args.zk_proofs_dir.as_ref().map(|d| d.join("eth-sync-program")),
            },
        ))
    });

    if args.period_full_sync {
        match (&store, &args.period_master_url) {
            (Some(store), Some(_)) => {
                let store = store.clone();
                tokio::spawn(async move {
                    if let Err(e) = store.full_sync_from_master().await {
                        warn!("initial full sync failed: {}", e);
                    }
                });
            }
            _ => warn!("--period-full-sync needs both a period store and a master url"),
        }
    }

    if args.stream_beacon_events {
        let beacon_urls = if args.beacon_nodes.is_empty() {
            NodePoolConfig::new(args.chain_id).beacon
        } else {
            args.beacon_nodes.clone()
        };
        let stream = events::EventStream {
            chain_id: args.chain_id,
            beacon_urls,
            pool: pool.clone(),
            store: store.clone(),
            prover: prover.clone(),
        };
        tokio::spawn(stream.run());
    }

    let state = AppState { chain_id: args.chain_id, pool, store, prover };
    let app = http::router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], args.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "http surface listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received, draining");
            colibri::shutdown::begin();
        })
        .await?;
    Ok(())
}
