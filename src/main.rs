//! Thrift-over-HTTP bridge server.
//!
//! Serves the demo services on every configured port.
//!
//! ```text
//!   HTTP/HTTPS client
//!        │ POST /path, body = Thrift envelope
//!        ▼
//!   ┌──────────┐   ┌──────────┐   ┌─────────────────┐   ┌────────────┐
//!   │   net    │──▶│   http   │──▶│ decorator chain │──▶│ dispatcher │──▶ handler
//!   │ TLS/port │   │  router  │   │ log/collect/met │   │  responder │
//!   └──────────┘   └──────────┘   └─────────────────┘   └────────────┘
//!        ▲                                                     │
//!        └──────────── 200 + encoded REPLY / EXCEPTION ◀───────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use thrift_http::config::{load_config, GatewayConfig};
use thrift_http::decorator::{LoggingLayer, MetricsLayer};
use thrift_http::lifecycle::signals::spawn_signal_listener;
use thrift_http::lifecycle::{builder_from_config, start_metrics, Shutdown};
use thrift_http::observability::logging;
use thrift_http::services::demo_services;

#[derive(Parser)]
#[command(name = "thrift-http")]
#[command(about = "Serve Thrift services over HTTP and HTTPS", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file
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

    logging::init(&config.observability)?;
    tracing::info!("thrift-http v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        listeners = config.effective_listeners().len(),
        request_timeout_secs = config.timeouts.request_secs,
        max_body_size = config.limits.max_body_size,
        "Configuration loaded"
    );

    start_metrics(&config)?;

    let mut builder = builder_from_config(&config)
        .await?
        .decorator(MetricsLayer::new())
        .decorator(LoggingLayer::new());
    for (path, service) in demo_services() {
        builder = builder.service_at(path, service);
    }

    let running = builder.build()?.start().await?;

    let shutdown = Shutdown::new();
    spawn_signal_listener(shutdown.clone());
    running.run_until(shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
