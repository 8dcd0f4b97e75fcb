//! Metrics collection and exposition.
//!
//! # Metrics
//! - `resilience_retry_attempts_total` (counter): failed attempts that were retried
//! - `resilience_retry_exhausted_total` (counter): retry runs that gave up
//! - `resilience_circuit_transitions_total` (counter): breaker transitions by breaker, target state
//! - `resilience_circuit_state` (gauge): 0=closed, 1=half-open, 2=open
//! - `resilience_circuit_rejected_total` (counter): calls failed fast by an open breaker
//! - `resilience_fallbacks_total` (counter): transient failures served from a fallback
//! - `security_rate_limited_total` (counter): denied requests by limiter
//! - `security_rate_limit_errors_total` (counter): limiter bookkeeping failures
//! - `security_rate_limit_entries` (gauge): identities tracked by the store
//!
//! Every helper is a no-op until a recorder is installed.

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::resilience::circuit_breaker::CircuitState;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics recorder"),
    }
}

pub fn record_retry_attempt() {
    metrics::counter!("resilience_retry_attempts_total").increment(1);
}

pub fn record_retry_exhausted() {
    metrics::counter!("resilience_retry_exhausted_total").increment(1);
}

pub fn record_circuit_transition(breaker: &str, to: CircuitState) {
    metrics::counter!(
        "resilience_circuit_transitions_total",
        "breaker" => breaker.to_string(),
        "to" => to.to_string()
    )
    .increment(1);
}

pub fn record_circuit_state(breaker: &str, state: CircuitState) {
    metrics::gauge!("resilience_circuit_state", "breaker" => breaker.to_string()).set(state.as_gauge());
}

pub fn record_circuit_rejected(breaker: &str) {
    metrics::counter!("resilience_circuit_rejected_total", "breaker" => breaker.to_string()).increment(1);
}

pub fn record_fallback() {
    metrics::counter!("resilience_fallbacks_total").increment(1);
}

pub fn record_rate_limited(limiter: &str) {
    metrics::counter!("security_rate_limited_total", "limiter" => limiter.to_string()).increment(1);
}

pub fn record_rate_limit_error(limiter: &str) {
    metrics::counter!("security_rate_limit_errors_total", "limiter" => limiter.to_string()).increment(1);
}

pub fn record_rate_limit_entries(entries: usize) {
    metrics::gauge!("security_rate_limit_entries").set(entries as f64);
}
