//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by method, status, service
//! - `gateway_request_duration_seconds` (histogram): latency by service
//! - `gateway_rate_limited_total` (counter): requests rejected by the limiter
//! - `gateway_upstream_errors_total` (counter): upstream failures by kind
//! - `gateway_websocket_sessions` (gauge): currently relayed upgrade sessions
//!
//! Recording is a no-op until a recorder is installed, so tests never need one.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, service: &str, start: Instant) {
    metrics::counter!(
        "gateway_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "service" => service.to_string()
    )
    .increment(1);
    metrics::histogram!("gateway_request_duration_seconds", "service" => service.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_rate_limited() {
    metrics::counter!("gateway_rate_limited_total").increment(1);
}

pub fn record_upstream_error(kind: &'static str) {
    metrics::counter!("gateway_upstream_errors_total", "kind" => kind).increment(1);
}

pub fn websocket_opened() {
    metrics::gauge!("gateway_websocket_sessions").increment(1.0);
}

pub fn websocket_closed() {
    metrics::gauge!("gateway_websocket_sessions").decrement(1.0);
}
