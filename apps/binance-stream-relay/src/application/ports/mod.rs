//! Port Interfaces
//!
//! Defines the interfaces (ports) between the relay pipeline and its
//! collaborators following the Hexagonal Architecture pattern.
//!
//! ## Driven Ports (Outbound)
//!
//! - [`RatePort`]: source of the display-currency conversion rate
//!
//! ## Inbound Contract
//!
//! - [`FeedEvent`]: the events the upstream feed connector emits into
//!   the relay pipeline channel

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::quote::TickerUpdate;

// =============================================================================
// Upstream Feed Contract
// =============================================================================

/// Observable states of the upstream feed session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No session and no dial in progress.
    Disconnected,
    /// Dialing the upstream endpoint.
    Connecting,
    /// Session open and streaming.
    Connected,
    /// Waiting out the reconnect delay after a session ended.
    Reconnecting,
    /// Session ended due to an error (transient; recovery follows).
    Error,
}

/// Events emitted by the upstream feed connector.
///
/// Close and transport error both surface as `Disconnected`: the
/// connector collapses every session-ending cause into one recovery
/// path.
#[derive(Debug, Clone)]
pub enum FeedEvent {
    /// Dialing the upstream endpoint.
    Connecting,
    /// Session established.
    Connected,
    /// Session ended (close frame, stream end, or transport error).
    Disconnected,
    /// Waiting out the reconnect delay before the next dial.
    Reconnecting {
        /// Reconnection attempt number.
        attempt: u32,
    },
    /// A decoded per-instrument update.
    Ticker(TickerUpdate),
    /// A non-fatal error worth surfacing to health reporting.
    Error(String),
}

// =============================================================================
// Rate Provider Port
// =============================================================================

/// Errors from the currency-rate provider.
#[derive(Debug, thiserror::Error)]
pub enum RateError {
    /// The rate request failed at the transport level.
    #[error("rate request failed: {0}")]
    Http(String),

    /// The rate response could not be interpreted.
    #[error("rate response malformed: {0}")]
    Malformed(String),
}

/// Source of the current display-currency conversion rate.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RatePort: Send + Sync {
    /// Fetch the current upstream-quote to display-currency rate.
    async fn fetch_rate(&self) -> Result<f64, RateError>;
}

/// Shared cell holding the last known conversion rate.
///
/// Written by the rate refresher on its schedule, read by the
/// normalizer on every update. On refresh failure the previous value
/// is simply retained, so readers always observe a valid rate.
#[derive(Debug, Clone)]
pub struct RateHandle {
    inner: Arc<parking_lot::RwLock<f64>>,
}

impl RateHandle {
    /// Create a handle seeded with a fallback rate.
    #[must_use]
    pub fn new(initial: f64) -> Self {
        Self {
            inner: Arc::new(parking_lot::RwLock::new(initial)),
        }
    }

    /// The last known rate.
    #[must_use]
    pub fn current(&self) -> f64 {
        *self.inner.read()
    }

    /// Replace the rate after a successful refresh.
    pub fn store(&self, rate: f64) {
        *self.inner.write() = rate;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_handle_returns_seed_until_stored() {
        let handle = RateHandle::new(83.0);
        assert!((handle.current() - 83.0).abs() < f64::EPSILON);

        handle.store(84.5);
        assert!((handle.current() - 84.5).abs() < f64::EPSILON);
    }

    #[test]
    fn rate_handle_clones_share_state() {
        let handle = RateHandle::new(1.0);
        let reader = handle.clone();
        handle.store(2.0);
        assert!((reader.current() - 2.0).abs() < f64::EPSILON);
    }
}
