//! API gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌───────────────────────────────────────────────────────┐
//!                     │                      API GATEWAY                      │
//!                     │                                                       │
//!   Client Request    │  ┌─────────┐   ┌─────────────────────────────────┐    │
//!   ──────────────────┼─▶│  http   │──▶│ Dispatcher (routing snapshot)   │    │
//!                     │  │ server  │   │  API match → routing override   │    │
//!                     │  └─────────┘   │  → cluster → load balancer      │    │
//!                     │                └───────────────┬─────────────────┘    │
//!                     │                                ▼                      │
//!                     │                ┌─────────────────────────────────┐    │
//!                     │                │ Filter chain                    │    │
//!                     │                │  analysis → circuit breaker     │    │
//!                     │                └───────────────┬─────────────────┘    │
//!                     │                                ▼                      │
//!   Client Response   │  ┌─────────┐   ┌─────────────────────────────────┐    │
//!   ◀─────────────────┼──│response │◀──│ hyper client (timeout)          │◀───┼── Backend
//!                     │  └─────────┘   └─────────────────────────────────┘    │   Server
//!                     │                                                       │
//!                     │  config watcher · health checker · admin API · metrics │
//!                     └───────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use clap::Parser;
use tokio::net::TcpListener;

use api_gateway::config::loader::load_config;
use api_gateway::config::watcher::ConfigWatcher;
use api_gateway::lifecycle::shutdown_signal;
use api_gateway::observability::{logging, metrics};
use api_gateway::GatewayServer;

#[derive(Parser)]
#[command(name = "api-gateway")]
#[command(about = "API gateway with per-server circuit breaking", long_about = None)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "gateway.toml")]
    config: PathBuf,

    /// Do not reload the configuration when the file changes.
    #[arg(long)]
    no_watch: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_config(&args.config)?;

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "api-gateway starting");

    tracing::info!(
        path = ?args.config,
        bind_address = %config.listener.bind_address,
        servers = config.servers.len(),
        clusters = config.clusters.len(),
        apis = config.apis.len(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    // The watcher must stay alive for reload events to flow
    let (_watcher, updates) = if args.no_watch {
        (None, None)
    } else {
        let (watcher, rx) = ConfigWatcher::new(&args.config);
        match watcher.run() {
            Ok(handle) => (Some(handle), Some(rx)),
            Err(e) => {
                tracing::warn!(error = %e, "Config watcher unavailable, hot reload disabled");
                (None, None)
            }
        }
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let server = GatewayServer::new(config)?;
    let shutdown = server.shutdown().clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown.trigger();
    });

    server.run(listener, updates).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
