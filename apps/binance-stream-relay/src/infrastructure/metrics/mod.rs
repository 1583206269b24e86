//! Prometheus Metrics Module
//!
//! Exposes relay metrics via Prometheus format for monitoring.
//!
//! # Metrics Categories
//!
//! - **Updates**: accepted and discarded upstream updates
//! - **Broadcasts**: snapshot fan-outs and per-subscriber deliveries
//! - **Connections**: subscriber count and upstream reconnects
//! - **Rates**: display-rate refresh failures
//!
//! # Integration
//!
//! Metrics are exposed at `/metrics` on the health server port.

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// # Panics
///
/// Panics if the recorder cannot be installed.
pub fn init_metrics() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            let builder = PrometheusBuilder::new();
            #[allow(clippy::expect_used)]
            let handle = builder
                .install_recorder()
                .expect("failed to install Prometheus recorder");

            register_metrics();
            handle
        })
        .clone()
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    // Update counters
    describe_counter!(
        "relay_updates_received_total",
        "Total per-instrument updates accepted from the upstream feed"
    );
    describe_counter!(
        "relay_updates_discarded_total",
        "Total upstream updates discarded by reason"
    );

    // Broadcast counters
    describe_counter!(
        "relay_broadcasts_total",
        "Total snapshot broadcasts triggered by accepted updates"
    );
    describe_counter!(
        "relay_frames_delivered_total",
        "Total snapshot frames delivered to subscribers"
    );

    // Connection gauges and counters
    describe_gauge!(
        "relay_subscribers",
        "Number of attached WebSocket subscribers"
    );
    describe_counter!(
        "relay_upstream_reconnects_total",
        "Total upstream reconnection attempts"
    );

    // Rate refresher
    describe_counter!(
        "relay_rate_refresh_failures_total",
        "Total failed display-rate refreshes"
    );

    // Latency histograms
    describe_histogram!(
        "relay_fanout_seconds",
        "Time from accepted update to completed fan-out"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Reasons an upstream update is discarded.
#[derive(Debug, Clone, Copy)]
pub enum DiscardReason {
    /// The identifier resolves to no tracked instrument.
    UnknownSymbol,
    /// The frame failed to decode.
    DecodeError,
}

impl DiscardReason {
    const fn as_str(self) -> &'static str {
        match self {
            Self::UnknownSymbol => "unknown_symbol",
            Self::DecodeError => "decode_error",
        }
    }
}

/// Record an accepted per-instrument update.
pub fn record_update_received() {
    counter!("relay_updates_received_total").increment(1);
}

/// Record a discarded upstream update.
pub fn record_update_discarded(reason: DiscardReason) {
    counter!(
        "relay_updates_discarded_total",
        "reason" => reason.as_str()
    )
    .increment(1);
}

/// Record one snapshot broadcast and its per-subscriber deliveries.
pub fn record_broadcast(delivered: usize) {
    counter!("relay_broadcasts_total").increment(1);
    counter!("relay_frames_delivered_total").increment(delivered as u64);
}

/// Update the attached subscriber count.
pub fn set_subscribers(count: usize) {
    #[allow(clippy::cast_precision_loss)]
    gauge!("relay_subscribers").set(count as f64);
}

/// Record an upstream reconnection attempt.
pub fn record_reconnect() {
    counter!("relay_upstream_reconnects_total").increment(1);
}

/// Record a failed display-rate refresh.
pub fn record_rate_refresh_failure() {
    counter!("relay_rate_refresh_failures_total").increment(1);
}

/// Record the update-to-fanout duration.
pub fn record_fanout_duration(duration: Duration) {
    histogram!("relay_fanout_seconds").record(duration.as_secs_f64());
}

// =============================================================================
// Tests
// =============================================================================
