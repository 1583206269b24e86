//! Ticker Stream Client
//!
//! Connects to Binance's combined ticker stream and owns the upstream
//! session lifecycle: dial, decode, failure detection and fixed-delay
//! reconnection.
//!
//! # Stream URL
//!
//! `wss://stream.binance.com:9443/stream?streams=btcusdt@ticker/...`
//!
//! The full instrument set is multiplexed into the subscription path at
//! connect time; no subscribe message is sent on the socket.
//!
//! # Recovery
//!
//! Every way a session can end - close frame, stream end, transport
//! error - funnels into one recovery path: emit `Disconnected`, wait
//! the fixed delay, emit `Reconnecting` and dial again. The loop has no
//! terminal state short of cancellation (or a configured attempt cap).

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use super::codec::JsonCodec;
use super::messages::{BinanceMessage, combined_stream_path};
use super::reconnect::{ReconnectConfig, ReconnectPolicy};
use crate::FeedSettings;
use crate::application::ports::FeedEvent;
use crate::domain::instrument::InstrumentRegistry;
use crate::infrastructure::metrics::{self, DiscardReason};

// =============================================================================
// Error Type
// =============================================================================

/// Errors that can occur in the ticker client.
#[derive(Debug, thiserror::Error)]
pub enum TickerClientError {
    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Maximum reconnection attempts exceeded.
    #[error("maximum reconnection attempts exceeded")]
    MaxReconnectAttemptsExceeded,

    /// Connection closed by the upstream.
    #[error("connection closed")]
    ConnectionClosed,
}

// =============================================================================
// Ticker Client Configuration
// =============================================================================

/// Configuration for the ticker client.
#[derive(Debug, Clone)]
pub struct TickerClientConfig {
    /// Full combined-stream WebSocket URL.
    pub url: String,
    /// Reconnection configuration.
    pub reconnect: ReconnectConfig,
}

impl TickerClientConfig {
    /// Create a new configuration with an explicit URL.
    #[must_use]
    pub fn new(url: String, reconnect: ReconnectConfig) -> Self {
        Self { url, reconnect }
    }

    /// Build the configuration for a registry: one multiplexed
    /// subscription path covering every tracked instrument.
    #[must_use]
    pub fn for_registry(settings: &FeedSettings, registry: &InstrumentRegistry) -> Self {
        Self {
            url: format!(
                "{}/stream?streams={}",
                settings.upstream_url.trim_end_matches('/'),
                combined_stream_path(registry)
            ),
            reconnect: ReconnectConfig::from_feed_settings(settings),
        }
    }
}

// =============================================================================
// Ticker Client
// =============================================================================

/// WebSocket client for the combined ticker stream.
///
/// Maintains at most one live session at a time and emits
/// [`FeedEvent`]s into the relay pipeline channel.
pub struct TickerClient {
    config: TickerClientConfig,
    codec: JsonCodec,
    event_tx: mpsc::Sender<FeedEvent>,
    cancel: CancellationToken,
}

impl TickerClient {
    /// Create a new ticker client.
    #[must_use]
    pub fn new(
        config: TickerClientConfig,
        event_tx: mpsc::Sender<FeedEvent>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            codec: JsonCodec::new(),
            event_tx,
            cancel,
        }
    }

    /// Run the connection loop.
    ///
    /// Connects, streams until the session ends, then recovers after
    /// the fixed delay. Runs until cancelled.
    ///
    /// # Errors
    ///
    /// Returns an error only if the configured attempt cap is
    /// exhausted; with the default unlimited cap this method returns
    /// `Ok` solely on cancellation.
    pub async fn run(self: Arc<Self>) -> Result<(), TickerClientError> {
        let mut reconnect_policy = ReconnectPolicy::new(self.config.reconnect.clone());

        loop {
            if self.cancel.is_cancelled() {
                tracing::info!("ticker client cancelled");
                return Ok(());
            }

            match self.connect_and_run(&mut reconnect_policy).await {
                Ok(()) => {
                    tracing::info!("ticker client stopped");
                    return Ok(());
                }
                Err(e) => {
                    match &e {
                        TickerClientError::ConnectionClosed => {
                            tracing::info!("upstream session closed");
                        }
                        other => {
                            tracing::warn!(error = %other, "upstream session error");
                            let _ = self.event_tx.send(FeedEvent::Error(other.to_string())).await;
                        }
                    }

                    let _ = self.event_tx.send(FeedEvent::Disconnected).await;

                    if let Some(delay) = reconnect_policy.next_delay() {
                        let attempt = reconnect_policy.attempt_count();
                        tracing::info!(
                            attempt,
                            delay_ms = delay.as_millis(),
                            "reconnecting to ticker stream"
                        );

                        let _ = self
                            .event_tx
                            .send(FeedEvent::Reconnecting { attempt })
                            .await;

                        tokio::select! {
                            () = self.cancel.cancelled() => {
                                tracing::info!("ticker client cancelled during reconnect delay");
                                return Ok(());
                            }
                            () = tokio::time::sleep(delay) => {}
                        }
                    } else {
                        return Err(TickerClientError::MaxReconnectAttemptsExceeded);
                    }
                }
            }
        }
    }

    /// Connect and stream until the session ends or cancellation.
    async fn connect_and_run(
        &self,
        reconnect_policy: &mut ReconnectPolicy,
    ) -> Result<(), TickerClientError> {
        tracing::info!(url = %self.config.url, "connecting to ticker stream");
        let _ = self.event_tx.send(FeedEvent::Connecting).await;

        let (ws_stream, _response) = tokio_tungstenite::connect_async(&self.config.url).await?;

        reconnect_policy.reset();
        let _ = self.event_tx.send(FeedEvent::Connected).await;

        let (mut write, mut read) = ws_stream.split();

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    let _ = write.send(Message::Close(None)).await;
                    return Ok(());
                }
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            self.handle_text(&text).await;
                        }
                        Some(Ok(Message::Ping(data))) => {
                            write.send(Message::Pong(data)).await?;
                        }
                        Some(Ok(Message::Close(_))) => {
                            tracing::info!("upstream sent close frame");
                            return Err(TickerClientError::ConnectionClosed);
                        }
                        Some(Ok(_)) => {
                            // Ignore other message types
                        }
                        Some(Err(e)) => {
                            return Err(e.into());
                        }
                        None => {
                            tracing::info!("WebSocket stream ended");
                            return Err(TickerClientError::ConnectionClosed);
                        }
                    }
                }
            }
        }
    }

    /// Handle one text frame.
    ///
    /// A malformed frame is logged and skipped; it never ends the
    /// session.
    async fn handle_text(&self, text: &str) {
        match self.codec.decode(text) {
            Ok(BinanceMessage::Ticker(message)) => {
                let _ = self
                    .event_tx
                    .send(FeedEvent::Ticker(message.to_update()))
                    .await;
            }
            Ok(BinanceMessage::Other) => {
                tracing::trace!("ignoring non-ticker frame");
            }
            Err(e) => {
                metrics::record_update_discarded(DiscardReason::DecodeError);
                tracing::warn!(error = %e, "failed to decode upstream frame");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::domain::instrument::{Instrument, InstrumentRegistry};

    use super::*;

    fn settings() -> FeedSettings {
        FeedSettings {
            upstream_url: "wss://stream.binance.com:9443".to_string(),
            quote_asset: "USDT".to_string(),
            reconnect_delay: Duration::from_secs(5),
            max_reconnect_attempts: 0,
        }
    }

    #[test]
    fn config_builds_multiplexed_url() {
        let registry = InstrumentRegistry::new(
            "USDT",
            vec![Instrument::major("BTC"), Instrument::major("ETH")],
        );
        let config = TickerClientConfig::for_registry(&settings(), &registry);

        assert_eq!(
            config.url,
            "wss://stream.binance.com:9443/stream?streams=btcusdt@ticker/ethusdt@ticker"
        );
        assert_eq!(config.reconnect.delay, Duration::from_secs(5));
    }

    #[test]
    fn config_tolerates_trailing_slash_in_base_url() {
        let mut feed = settings();
        feed.upstream_url = "wss://stream.binance.com:9443/".to_string();
        let registry = InstrumentRegistry::new("USDT", vec![Instrument::major("BTC")]);

        let config = TickerClientConfig::for_registry(&feed, &registry);
        assert_eq!(
            config.url,
            "wss://stream.binance.com:9443/stream?streams=btcusdt@ticker"
        );
    }

    #[tokio::test]
    async fn decode_failure_does_not_end_session() {
        let (tx, mut rx) = mpsc::channel(8);
        let client = TickerClient::new(
            TickerClientConfig::new("wss://unused".to_string(), ReconnectConfig::default()),
            tx,
            CancellationToken::new(),
        );

        client.handle_text("not json at all").await;
        client
            .handle_text(r#"{"stream":"btcusdt@ticker","data":{"e":"24hrTicker","s":"BTCUSDT","c":"1.0"}}"#)
            .await;

        // Only the well-formed ticker frame produced an event.
        match rx.try_recv().unwrap() {
            FeedEvent::Ticker(update) => assert_eq!(update.upstream_symbol, "BTCUSDT"),
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(rx.try_recv().is_err());
    }
}
