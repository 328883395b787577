//! Metrics definitions for the session engine.
//!
//! Naming follows Prometheus conventions:
//! - `se_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Every label is bounded by code:
//! - `outcome`: a handful of fixed strings per metric
//! - `event`: the signaling event names in [`crate::signaling::events`]
//! - `status`: unavailable, success, rejected, error, timeout, dropped
//! - `state`: idle, requesting, active, ending

use metrics::{counter, gauge, histogram};
use std::time::Duration;

// ============================================================================
// Layout Metrics
// ============================================================================

/// Record a reorder request.
///
/// Metric: `se_reorder_passes_total`
/// Labels: `outcome` (ran, gated)
pub fn record_reorder_pass(outcome: &'static str) {
    counter!("se_reorder_passes_total", "outcome" => outcome).increment(1);
}

/// Record a card that failed to build and was skipped.
///
/// Metric: `se_card_build_failures_total`
/// Labels: none
pub fn record_card_build_failure() {
    counter!("se_card_build_failures_total").increment(1);
}

/// Record a page navigation attempt.
///
/// Metric: `se_breakout_navigation_total`
/// Labels: `outcome` (navigated, unchanged, denied, invalid)
pub fn record_breakout_navigation(outcome: &'static str) {
    counter!("se_breakout_navigation_total", "outcome" => outcome).increment(1);
}

// ============================================================================
// Lifecycle Metrics
// ============================================================================

/// Record a remote producer closure.
///
/// Metric: `se_producer_closed_total`
/// Labels: `outcome` (removed, unknown)
///
/// `unknown` counts closures for producers with no receive-side entry. A
/// steady rate points at a signaling ordering problem.
pub fn record_producer_closed(outcome: &'static str) {
    counter!("se_producer_closed_total", "outcome" => outcome).increment(1);
}

/// Set the number of receive-side consumer transports.
///
/// Metric: `se_consumer_transports_active`
/// Labels: none
pub fn set_consumer_transports_active(count: usize) {
    // usize to f64 conversion is safe for realistic consumer counts
    #[allow(clippy::cast_precision_loss)]
    gauge!("se_consumer_transports_active").set(count as f64);
}

/// Record a local screen-share state transition.
///
/// Metric: `se_screen_share_transitions_total`
/// Labels: `state` (idle, requesting, active, ending)
pub fn record_screen_share_transition(state: &'static str) {
    counter!("se_screen_share_transitions_total", "state" => state).increment(1);
}

// ============================================================================
// Signaling Metrics
// ============================================================================

/// Record the result of an outbound signaling request.
///
/// Metric: `se_signaling_requests_total`
/// Labels: `event`, `status`
///
/// Cardinality: 9 events x 6 statuses
pub fn record_signaling_request(event: &str, status: &'static str) {
    counter!(
        "se_signaling_requests_total",
        "event" => event.to_string(),
        "status" => status
    )
    .increment(1);
}

/// Record signaling request round-trip time.
///
/// Metric: `se_signaling_latency_seconds`
/// Labels: `event`
pub fn record_signaling_latency(event: &str, duration: Duration) {
    histogram!("se_signaling_latency_seconds", "event" => event.to_string())
        .record(duration.as_secs_f64());
}

// ============================================================================
// Actor Metrics
// ============================================================================

/// Set the session actor's mailbox depth.
///
/// Metric: `se_actor_mailbox_depth`
/// Labels: none
pub fn set_actor_mailbox_depth(depth: usize) {
    // usize to f64 conversion is safe for realistic mailbox depths
    #[allow(clippy::cast_precision_loss)]
    gauge!("se_actor_mailbox_depth").set(depth as f64);
}
