//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define gateway metrics (requests, latency, breaker activity, table updates)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by method, status, api
//! - `gateway_request_duration_seconds` (histogram): latency distribution
//! - `gateway_circuit_transitions_total` (counter): breaker transitions by server
//! - `gateway_circuit_status` (gauge): 0=open, 1=half, 2=close
//! - `gateway_circuit_rejections_total` (counter): rejected calls by signal
//! - `gateway_no_route_total` (counter): requests without a destination
//! - `gateway_health_probes_total` (counter): probes by result
//! - `gateway_table_updates_total` (counter): table updates by kind and result

use std::net::SocketAddr;
use std::time::Instant;
use ::metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::resilience::CircuitStatus;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, api: &str, start: Instant) {
    counter!(
        "gateway_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "api" => api.to_string()
    )
    .increment(1);
    histogram!("gateway_request_duration_seconds", "api" => api.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_circuit_transition(server: &str, from: CircuitStatus, to: CircuitStatus) {
    counter!(
        "gateway_circuit_transitions_total",
        "server" => server.to_string(),
        "from" => from.as_str(),
        "to" => to.as_str()
    )
    .increment(1);
    gauge!("gateway_circuit_status", "server" => server.to_string()).set(to as u8 as f64);
}

pub fn record_circuit_rejection(server: &str, signal: &'static str) {
    counter!(
        "gateway_circuit_rejections_total",
        "server" => server.to_string(),
        "signal" => signal
    )
    .increment(1);
}

pub fn record_no_route(reason: &'static str) {
    counter!("gateway_no_route_total", "reason" => reason).increment(1);
}

pub fn record_health_probe(server: &str, healthy: bool) {
    let result = if healthy { "success" } else { "failure" };
    counter!(
        "gateway_health_probes_total",
        "server" => server.to_string(),
        "result" => result
    )
    .increment(1);
}

pub fn record_table_update(kind: &'static str, applied: bool) {
    let result = if applied { "applied" } else { "rejected" };
    counter!("gateway_table_updates_total", "kind" => kind, "result" => result).increment(1);
}
