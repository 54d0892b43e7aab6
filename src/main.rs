//! Stacks Node Map
//!
//! Crawls the Stacks peer network from a set of seed nodes and keeps a
//! geolocated snapshot of every node it finds.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      STX NODE MAP                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Crawl Frontier     ←── /v2/neighbors, hop bounded         │
//! │  Peer Probe         ←── /v2/neighbors and /v2/info         │
//! │  Geo Resolver       ←── IP geolocation, cached 30 days     │
//! │  Registry (JSON)    ←── data.json, rewritten each cycle    │
//! │  Status (JSON)      ←── status.json, current phase         │
//! │  Periodic Rescan    ←── refreshes version and height       │
//! │  HTTP API (8089)    ←── /nodes, /status, metrics           │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

mod api;
mod config;
mod crawl;
mod geo;
mod probe;
mod registry;
mod scanner;
mod status;
mod types;

#[cfg(test)]
mod testing;

use api::{ApiState, Metrics};
use config::MapperConfig;
use geo::HttpGeoResolver;
use probe::HttpPeerProbe;
use registry::RegistryFile;
use scanner::ScanOrchestrator;
use status::StatusReporter;

/// Stacks Node Map - peer network discovery and enrichment
#[derive(Parser, Debug)]
#[command(name = "stx-node-map")]
#[command(version)]
#[command(about = "Discovers and geolocates Stacks network nodes", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "node-map.toml")]
    config: PathBuf,

    /// Data directory for the node registry and status
    #[arg(short, long, default_value = "./data")]
    data_dir: PathBuf,

    /// HTTP API port
    #[arg(long)]
    api_port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Comma-separated seed node addresses
    #[arg(long, env = "DISCOVERER_SEED_NODES")]
    seed_nodes: Option<String>,

    /// Network identifier reported by the API
    #[arg(long, env = "NETWORK")]
    network: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.clone().into())
        )
        .init();

    info!("🌐 Stacks Node Map v{}", env!("CARGO_PKG_VERSION"));

    tokio::fs::create_dir_all(&args.data_dir).await?;

    // Load configuration
    let config = if args.config.exists() {
        MapperConfig::load(&args.config)?
    } else {
        warn!("Config file not found, using defaults");
        MapperConfig::default()
    };

    // Override config with CLI args and environment
    let config = config
        .with_seed_nodes(args.seed_nodes)
        .with_network(args.network)
        .with_api_port(args.api_port);

    config.validate()?;

    if config.seed_nodes.is_empty() {
        warn!("No seed nodes configured, every crawl will come up empty");
    }

    info!("⚙️  Configuration:");
    info!("   Network: {}", config.network);
    info!("   Seeds: {}", config.seed_nodes.join(", "));
    info!("   Hops: {}", config.crawl_hops);
    info!("   Scan interval: {}s", config.scan_interval_secs);
    info!("   Rescan interval: {}s", config.rescan_interval_secs);
    info!("   API port: {}", config.api_port);

    let shared_config = Arc::new(config);
    let metrics = Arc::new(Metrics::new());

    let probe = Arc::new(HttpPeerProbe::new(&shared_config, metrics.clone())?);
    let geo = Arc::new(HttpGeoResolver::new(&shared_config, metrics.clone())?);

    let store = Arc::new(RegistryFile::new(args.data_dir.join("data.json")));
    let status = Arc::new(StatusReporter::new(args.data_dir.join("status.json")));
    info!("📦 Registry at {:?}", store.path());

    let orchestrator = Arc::new(ScanOrchestrator::new(
        shared_config.clone(),
        probe,
        geo,
        store.clone(),
        status.clone(),
        metrics.clone(),
    ));

    // Start all services concurrently
    let discovery_handle = tokio::spawn(scanner::run_discovery_loop(
        orchestrator.clone(),
        shared_config.scan_interval_secs,
    ));

    let rescan_handle = tokio::spawn(scanner::run_periodic_rescan(
        orchestrator,
        shared_config.rescan_initial_delay_secs,
        shared_config.rescan_interval_secs,
    ));

    let api_handle = tokio::spawn(api::run_api_server(Arc::new(ApiState {
        config: shared_config.clone(),
        store,
        status,
        metrics,
    })));

    info!("✅ All services started");
    info!("   Press Ctrl+C to shutdown");

    // Wait for shutdown signal
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("🛑 Shutdown signal received");
        }
        result = discovery_handle => {
            error!("Discovery loop exited: {:?}", result);
        }
        result = rescan_handle => {
            error!("Periodic rescan exited: {:?}", result);
        }
        result = api_handle => {
            error!("HTTP API exited: {:?}", result);
        }
    }

    info!("👋 Stacks Node Map shutting down");
    Ok(())
}
