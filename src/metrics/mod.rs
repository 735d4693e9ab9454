//! Prometheus metrics for a snipe run
//!
//! Exposes metrics for:
//! - Indexer polling outcomes
//! - Submission attempts and broadcasts
//! - Final run result
//!
//! There is no scrape endpoint; the text exposition is rendered once at exit.

use lazy_static::lazy_static;
use prometheus::{register_counter_vec, CounterVec, Encoder, TextEncoder};
use std::path::Path;

lazy_static! {
    pub static ref INDEXER_REQUESTS: CounterVec = register_counter_vec!(
        "sniper_indexer_requests_total",
        "Indexer requests by outcome",
        &["outcome"]
    ).unwrap();

    pub static ref SUBMISSION_ATTEMPTS: CounterVec = register_counter_vec!(
        "sniper_submission_attempts_total",
        "Submission attempts by outcome",
        &["outcome"]
    ).unwrap();

    pub static ref BROADCASTS: CounterVec = register_counter_vec!(
        "sniper_broadcasts_total",
        "Signed transactions accepted by the node",
        &[]
    ).unwrap();

    pub static ref GAS_LIMIT_FALLBACKS: CounterVec = register_counter_vec!(
        "sniper_gas_limit_fallbacks_total",
        "Gas estimations that fell back to the default limit",
        &[]
    ).unwrap();

    pub static ref SNIPE_RESULTS: CounterVec = register_counter_vec!(
        "sniper_results_total",
        "Run results (succeeded, exhausted, detection_failed)",
        &["result"]
    ).unwrap();
}

pub fn record_indexer_request(outcome: &str) {
    INDEXER_REQUESTS.with_label_values(&[outcome]).inc();
}

pub fn record_attempt(outcome: &str) {
    SUBMISSION_ATTEMPTS.with_label_values(&[outcome]).inc();
}

pub fn record_broadcast() {
    BROADCASTS.with_label_values(&[]).inc();
}

pub fn record_gas_limit_fallback() {
    GAS_LIMIT_FALLBACKS.with_label_values(&[]).inc();
}

pub fn record_snipe_result(result: &str) {
    SNIPE_RESULTS.with_label_values(&[result]).inc();
}

/// Render all registered metrics in the Prometheus text format
pub fn render() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!("Failed to encode metrics: {}", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Write the rendered metrics to `path`
pub fn dump(path: &Path) -> std::io::Result<()> {
    std::fs::write(path, render())
}
