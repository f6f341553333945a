//! Metrics collection and exposition.
//!
//! # Metrics
//! - `thrift_requests_total` (counter): calls by service, method, outcome
//! - `thrift_request_duration_seconds` (histogram): dispatch latency
//! - `thrift_transport_errors_total` (counter): HTTP-level rejections by kind
//!
//! Recording goes through the `metrics` facade and is a no-op until a
//! recorder is installed.

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Serve a Prometheus scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Prometheus exporter listening");
    Ok(())
}

pub fn record_call(service: &str, method: &str, outcome: &'static str, elapsed: Duration) {
    counter!(
        "thrift_requests_total",
        "service" => service.to_string(),
        "method" => method.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    histogram!(
        "thrift_request_duration_seconds",
        "service" => service.to_string(),
        "method" => method.to_string()
    )
    .record(elapsed.as_secs_f64());
}

pub fn record_transport_error(kind: &'static str) {
    counter!("thrift_transport_errors_total", "kind" => kind).increment(1);
}
