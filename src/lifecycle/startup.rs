//! Startup orchestration.
//!
//! # Responsibilities
//! - Turn a validated `GatewayConfig` into a `ServerBuilder`
//! - Load TLS material for every HTTPS listener
//! - Install the metrics exporter when enabled
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Services and decorators are added by the caller after this step

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use thiserror::Error;

use crate::config::{GatewayConfig, TlsConfig};
use crate::http::ServerBuilder;
use crate::net::tls::{load_tls_config, TlsError};
use crate::net::SessionProtocol;
use crate::observability::metrics::init_metrics;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid bind address {0:?}")]
    BindAddress(String),

    #[error("invalid metrics address {0:?}")]
    MetricsAddress(String),

    #[error(transparent)]
    Tls(#[from] TlsError),

    #[error("failed to start metrics exporter: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),
}

async fn load(tls: &TlsConfig) -> Result<axum_server::tls_rustls::RustlsConfig, TlsError> {
    load_tls_config(Path::new(&tls.cert_path), Path::new(&tls.key_path)).await
}

/// Ports, TLS, limits and routing policy from `config`.
pub async fn builder_from_config(config: &GatewayConfig) -> Result<ServerBuilder, StartupError> {
    let mut builder = ServerBuilder::new()
        .request_timeout(Duration::from_secs(config.timeouts.request_secs))
        .shutdown_grace(Duration::from_secs(config.timeouts.shutdown_grace_secs))
        .max_body_size(config.limits.max_body_size)
        .max_concurrent_requests(config.limits.max_concurrent_requests)
        .allow_path_override(config.routing.allow_path_override);

    if let Some(tls) = &config.tls {
        builder = builder.tls(load(tls).await?);
    }

    for listener in config.effective_listeners() {
        let addr: SocketAddr = listener
            .bind_address
            .parse()
            .map_err(|_| StartupError::BindAddress(listener.bind_address.clone()))?;
        builder = match (&listener.protocol, &listener.tls) {
            (SessionProtocol::Https, Some(tls)) => builder.port_with_tls(addr, load(tls).await?),
            (protocol, _) => builder.port(addr, *protocol),
        };
    }

    Ok(builder)
}

/// Start the Prometheus exporter if the config asks for it.
pub fn start_metrics(config: &GatewayConfig) -> Result<(), StartupError> {
    let observability = &config.observability;
    if !observability.metrics_enabled {
        return Ok(());
    }
    let addr: SocketAddr = observability
        .metrics_address
        .parse()
        .map_err(|_| StartupError::MetricsAddress(observability.metrics_address.clone()))?;
    init_metrics(addr)?;
    Ok(())
}
