//! Metrics collection and exposition.
//!
//! # Metrics
//! - `portal_transactions_resolved_total` (counter): terminal records by type, outcome
//! - `portal_poll_steps_total` (counter): status steps by type
//! - `portal_rpc_errors_total` (counter): failed RPC calls by error kind
//! - `portal_auth_expiries_total` (counter): detected session expiries
//! - `portal_approvals_total` (counter): allowance approvals by outcome
//! - `portal_commits_total` (counter): submissions by type, path, outcome
//! - `portal_ledger_records` (gauge): records per network partition
//! - `portal_rpc_health` (gauge): 1=healthy, 0=unhealthy
//!
//! # Design Decisions
//! - Recording is a no-op until an exporter is installed
//! - The Prometheus exporter is optional and bound from configuration

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with its HTTP scrape listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(address: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(address)
        .install()
        .map_err(|e| format!("Failed to install metrics exporter: {}", e))?;
    tracing::info!(address = %address, "Metrics endpoint listening");
    Ok(())
}

pub fn record_resolved(tx_type: &str, outcome: &'static str) {
    metrics::counter!(
        "portal_transactions_resolved_total",
        "type" => tx_type.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_poll_step(tx_type: &str) {
    metrics::counter!("portal_poll_steps_total", "type" => tx_type.to_string()).increment(1);
}

pub fn record_rpc_error(kind: &'static str) {
    metrics::counter!("portal_rpc_errors_total", "kind" => kind).increment(1);
}

pub fn record_auth_expiry() {
    metrics::counter!("portal_auth_expiries_total").increment(1);
}

pub fn record_approval(outcome: &'static str) {
    metrics::counter!("portal_approvals_total", "outcome" => outcome).increment(1);
}

pub fn record_commit(tx_type: &str, path: &'static str, outcome: &'static str) {
    metrics::counter!(
        "portal_commits_total",
        "type" => tx_type.to_string(),
        "path" => path,
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_ledger_size(network: &str, records: usize) {
    metrics::gauge!("portal_ledger_records", "network" => network.to_string()).set(records as f64);
}

/// Record RPC endpoint health (1 = healthy, 0 = unhealthy).
pub fn record_rpc_health(label: &str, healthy: bool) {
    metrics::gauge!("portal_rpc_health", "client" => label.to_string())
        .set(if healthy { 1.0 } else { 0.0 });
}
