//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Count served requests by method, status and response kind
//! - Track routing table size
//! - Expose a Prometheus-compatible scrape endpoint
//!
//! # Metrics
//! - `moxy_requests_total` (counter): requests by method, status, kind
//! - `moxy_request_duration_seconds` (histogram): latency including delays
//! - `moxy_routes_registered` (gauge): registered persistent routes
//! - `moxy_once_routes` (gauge): pending one-shot routes
//! - `moxy_proxy_failures_total` (counter): upstream failures by reason
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed, so library users
//!   and tests pay nothing

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, kind: &'static str, started: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("status", status.to_string()),
        ("kind", kind.to_string()),
    ];
    metrics::counter!("moxy_requests_total", &labels).increment(1);
    metrics::histogram!("moxy_request_duration_seconds", &labels)
        .record(started.elapsed().as_secs_f64());
}

pub fn record_route_count(persistent: usize, once: usize) {
    metrics::gauge!("moxy_routes_registered").set(persistent as f64);
    metrics::gauge!("moxy_once_routes").set(once as f64);
}

pub fn record_proxy_failure(reason: &'static str) {
    metrics::counter!("moxy_proxy_failures_total", "reason" => reason).increment(1);
}
