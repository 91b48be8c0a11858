//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define edge metrics (decisions, latency, rule loads, invocations)
//! - Expose a Prometheus-compatible scrape endpoint
//!
//! # Metrics
//! - `edge_requests_total` (counter): requests by decision, status
//! - `edge_request_duration_seconds` (histogram): latency by decision
//! - `edge_rules_loaded` (gauge): rules kept per control document
//! - `edge_control_document_errors_total` (counter): unusable documents
//! - `edge_function_invocations_total` (counter): invocations by outcome
//!
//! # Design Decisions
//! - Low-overhead metric updates (atomic operations)
//! - Labels stay low-cardinality: no paths, no function ids

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its HTTP listener on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(decision: &'static str, status: u16, start: Instant) {
    let labels = [
        ("decision", decision.to_string()),
        ("status", status.to_string()),
    ];
    metrics::counter!("edge_requests_total", &labels).increment(1);
    metrics::histogram!("edge_request_duration_seconds", "decision" => decision)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_rules_loaded(document: &'static str, count: usize) {
    metrics::gauge!("edge_rules_loaded", "document" => document).set(count as f64);
}

pub fn record_document_error(document: &'static str) {
    metrics::counter!("edge_control_document_errors_total", "document" => document).increment(1);
}

pub fn record_function_invocation(outcome: &'static str) {
    metrics::counter!("edge_function_invocations_total", "outcome" => outcome).increment(1);
}
