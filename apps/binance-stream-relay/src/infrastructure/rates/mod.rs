//! Currency Rate Provider
//!
//! Concrete adapter for the display-currency conversion rate plus the
//! fixed-interval refresher that keeps the shared [`RateHandle`]
//! current.
//!
//! The refresher tolerates provider failures: the last known rate is
//! retained and normalization proceeds with stale-but-valid data. The
//! first refresh fires immediately at startup, before the first
//! interval elapses.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{RateError, RateHandle, RatePort};
use crate::infrastructure::metrics;

// =============================================================================
// CoinGecko Adapter
// =============================================================================

/// Rate provider backed by the CoinGecko simple-price endpoint.
///
/// Queries the USDT price in the display currency; the response looks
/// like `{"tether": {"inr": 83.12}}`.
#[derive(Debug)]
pub struct CoinGeckoRates {
    client: reqwest::Client,
    endpoint: String,
}

impl CoinGeckoRates {
    /// Create a new adapter for the given endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, RateError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RateError::Http(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl RatePort for CoinGeckoRates {
    async fn fetch_rate(&self) -> Result<f64, RateError> {
        let response = self
            .client
            .get(&self.endpoint)
            .send()
            .await
            .map_err(|e| RateError::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Err(RateError::Http(format!(
                "unexpected status {}",
                response.status()
            )));
        }

        let body: SimplePriceResponse = response
            .json()
            .await
            .map_err(|e| RateError::Malformed(e.to_string()))?;

        Ok(body.tether.inr)
    }
}

// API response types

#[derive(Debug, Deserialize)]
struct SimplePriceResponse {
    tether: TetherRates,
}

#[derive(Debug, Deserialize)]
struct TetherRates {
    inr: f64,
}

// =============================================================================
// Rate Refresher
// =============================================================================

/// Periodically refreshes the shared rate from a provider.
pub struct RateRefresher {
    provider: Arc<dyn RatePort>,
    handle: RateHandle,
    interval: Duration,
    cancel: CancellationToken,
}

impl RateRefresher {
    /// Create a refresher over the given provider and shared handle.
    #[must_use]
    pub fn new(
        provider: Arc<dyn RatePort>,
        handle: RateHandle,
        interval: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            provider,
            handle,
            interval,
            cancel,
        }
    }

    /// Run the refresh loop until cancelled.
    ///
    /// The first tick completes immediately, so the fallback rate is
    /// replaced as soon as the provider answers.
    pub async fn run(self) {
        let mut ticks = tokio::time::interval(self.interval);
        ticks.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    tracing::debug!("rate refresher cancelled");
                    break;
                }
                _ = ticks.tick() => {
                    self.refresh_once().await;
                }
            }
        }
    }

    /// Perform one refresh, retaining the last known rate on failure.
    pub async fn refresh_once(&self) {
        match self.provider.fetch_rate().await {
            Ok(rate) => {
                self.handle.store(rate);
                tracing::info!(rate, "display rate updated");
            }
            Err(e) => {
                metrics::record_rate_refresh_failure();
                tracing::warn!(
                    error = %e,
                    last_known = self.handle.current(),
                    "rate refresh failed, keeping last known rate"
                );
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
