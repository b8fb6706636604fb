//! Prometheus metrics for claim races.
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally. A registration failure
//! means duplicate metric names, which should crash at startup rather than
//! fail silently. These panics only occur during static initialization.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, register_int_counter, register_int_gauge,
    CounterVec, Encoder, HistogramVec, IntCounter, IntGauge, TextEncoder,
};

use crate::error::TelemetryResult;

/// Total race sessions accepted by the observer endpoint.
pub static SESSIONS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("claimrace_sessions_total", "Total race sessions started").unwrap()
});

/// Sessions currently scheduled or racing.
pub static ACTIVE_SESSIONS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "claimrace_active_sessions",
        "Race sessions currently scheduled or running"
    )
    .unwrap()
});

/// Session setup failures (configuration errors).
/// Labels: reason
pub static SESSION_ERRORS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "claimrace_session_errors_total",
        "Sessions rejected before the race started",
        &["reason"]
    )
    .unwrap()
});

/// Claim attempts.
/// Labels: outcome (success/failure), kind (failure classification or "none")
pub static CLAIM_ATTEMPTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "claimrace_claim_attempts_total",
        "Total claim submissions",
        &["outcome", "kind"]
    )
    .unwrap()
});

/// Sessions won by a claim worker.
pub static CLAIM_WINS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("claimrace_claim_wins_total", "Claims accepted by the ledger").unwrap()
});

/// Claim submission latency in milliseconds.
/// Labels: outcome
pub static CLAIM_LATENCY_MS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "claimrace_claim_latency_ms",
        "Claim submission round-trip in milliseconds",
        &["outcome"],
        vec![1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0]
    )
    .unwrap()
});

/// Relay transfers.
/// Labels: outcome (success/failure)
pub static RELAY_TRANSFERS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "claimrace_relay_transfers_total",
        "Relay transfer submissions",
        &["outcome"]
    )
    .unwrap()
});

/// Terminal worker states.
/// Labels: state (succeeded/exhausted/cancelled)
pub static WORKER_OUTCOMES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "claimrace_worker_outcomes_total",
        "Terminal claim worker states",
        &["state"]
    )
    .unwrap()
});

/// Metrics helper.
pub struct Metrics;

impl Metrics {
    /// Record a session entering the scheduler.
    pub fn session_started() {
        SESSIONS_TOTAL.inc();
        ACTIVE_SESSIONS.inc();
    }

    /// Record a session whose actors have all terminated.
    pub fn session_finished() {
        ACTIVE_SESSIONS.dec();
    }

    /// Record a session rejected before the race.
    pub fn session_rejected(reason: &str) {
        SESSION_ERRORS_TOTAL.with_label_values(&[reason]).inc();
    }

    /// Record a successful claim attempt.
    pub fn claim_succeeded(latency_ms: f64) {
        CLAIM_ATTEMPTS_TOTAL
            .with_label_values(&["success", "none"])
            .inc();
        CLAIM_LATENCY_MS
            .with_label_values(&["success"])
            .observe(latency_ms);
        CLAIM_WINS_TOTAL.inc();
    }

    /// Record a failed claim attempt with its classification.
    pub fn claim_failed(kind: &str, latency_ms: f64) {
        CLAIM_ATTEMPTS_TOTAL
            .with_label_values(&["failure", kind])
            .inc();
        CLAIM_LATENCY_MS
            .with_label_values(&["failure"])
            .observe(latency_ms);
    }

    /// Record a relay transfer result.
    pub fn relay_transfer(success: bool) {
        let outcome = if success { "success" } else { "failure" };
        RELAY_TRANSFERS_TOTAL.with_label_values(&[outcome]).inc();
    }

    /// Record a terminal worker state.
    pub fn worker_finished(state: &str) {
        WORKER_OUTCOMES_TOTAL.with_label_values(&[state]).inc();
    }
}

/// Encode all registered metrics in the Prometheus text format.
pub fn encode_metrics() -> TelemetryResult<String> {
    let encoder = TextEncoder::new();
    let families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| crate::TelemetryError::Metrics(e.to_string()))
}
