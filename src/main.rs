//! Upstream gateway
//!
//! Sits in front of an application server, routes every request through an
//! ordered route table, and streams authorized service-proxy calls to the
//! targets the application server grants.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client ──▶ http::server ──▶ routing::Upstream ──┬──▶ proxy::backend ──────────▶ App server
//!                (correlation id,  (clean path,        │
//!                 request span)     prefix, 1st match) └──▶ proxy::service
//!                                                             │ auth::BackendAuthorizer ──▶ App server
//!                                                             ▼
//!                                                           proxy::streaming ──────────▶ Service
//!                                                             (transport per trust root)
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use upstream_gateway::config::{load_config, GatewayConfig};
use upstream_gateway::observability::{logging, metrics};
use upstream_gateway::{GatewayServer, Shutdown};

#[derive(Parser)]
#[command(name = "upstream-gateway")]
#[command(about = "Routing and authorized streaming proxy in front of an application server", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file. Built-in defaults when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };

    logging::init_logging(&config.observability);
    tracing::info!("upstream-gateway v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        backend = %config.backend.url,
        routes = config.routes.len(),
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

    let server = GatewayServer::new(&config)?;

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let signals = shutdown.clone();
    tokio::spawn(async move { signals.listen_for_signals().await });

    server.run(listener, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
