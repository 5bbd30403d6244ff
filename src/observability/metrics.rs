//! Metrics collection and exposition.
//!
//! # Metrics
//! - `stub_requests_total` (counter): requests by method and status (0 = dropped)
//! - `stub_request_duration_seconds` (histogram): latency including configured delay
//! - `stub_config_reloads_total` (counter): reloads by outcome
//! - `stub_rules_active` (gauge): rules in the published table
//! - `stub_active_connections` (gauge): open client connections

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    metrics::counter!(
        "stub_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("stub_request_duration_seconds", "method" => method.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_reload(outcome: &'static str) {
    metrics::counter!("stub_config_reloads_total", "outcome" => outcome).increment(1);
}

pub fn set_active_rules(count: usize) {
    metrics::gauge!("stub_rules_active").set(count as f64);
}

pub fn set_active_connections(count: u64) {
    metrics::gauge!("stub_active_connections").set(count as f64);
}
