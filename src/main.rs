//! Edge router
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http server ──▶ EdgeRouter snapshot
//!                     (request id,      │
//!                      trace, timeout)  ├─▶ auth gate      ──▶ 401 challenge
//!                                       ├─▶ redirects      ──▶ 301/302/...
//!                                       ├─▶ function rules ──▶ remote function
//!                                       └─▶ static fallback ─▶ object store
//!
//!     Control documents (object store) ──▶ rules loader ──▶ snapshot swap
//!     Config file (TOML) ──▶ watcher ──────────────────────▶ snapshot swap
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use edge_router::config::{load_config, ConfigWatcher, EdgeConfig};
use edge_router::http::HttpServer;
use edge_router::lifecycle::{signals, startup, Shutdown};
use edge_router::observability::{logging, metrics};

#[derive(Parser, Debug)]
#[command(name = "edge-router", version, about = "Object-store backed edge router")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, env = "EDGE_ROUTER_CONFIG")]
    config: Option<PathBuf>,

    /// Override the listener bind address.
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => EdgeConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
    }

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "edge-router starting");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    tracing::info!(
        bind_address = %config.listener.bind_address,
        storage = ?config.storage.backend,
        bucket = %config.storage.bucket,
        functions = %config.functions.base_url,
        "Configuration loaded"
    );

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let shared = startup::bootstrap(config).await?;
    let shutdown = Shutdown::new();

    // Keep the watcher alive for the whole run.
    let _watcher = match &args.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            startup::spawn_config_reloader(shared.clone(), updates, shutdown.subscribe());
            match watcher.run() {
                Ok(watcher) => Some(watcher),
                Err(e) => {
                    tracing::warn!(error = %e, "Config watcher unavailable, hot reload disabled");
                    None
                }
            }
        }
        None => None,
    };

    signals::spawn_shutdown_listener(shutdown.clone());
    signals::spawn_reload_listener(shared.clone(), &shutdown);

    HttpServer::new(shared).run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
