//! Relay Pipeline
//!
//! The single state-owning task at the center of the relay: it consumes
//! decoded feed events from the upstream connector's channel, drives
//! normalize -> upsert -> broadcast for each accepted update, and keeps
//! the feed status that health reporting exposes.
//!
//! Processing one event at a time on one task is what makes the quote
//! book safe without locking: the book is mutated and serialized here
//! and nowhere else.

use std::sync::Arc;
use std::sync::atomic::{AtomicI32, AtomicU64, Ordering};
use std::time::Instant;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use crate::application::ports::{ConnectionState, FeedEvent, RateHandle};
use crate::domain::instrument::InstrumentRegistry;
use crate::domain::quote::{QuoteBook, TickerUpdate};
use crate::infrastructure::broadcast::BroadcastHub;
use crate::infrastructure::metrics::{self, DiscardReason};

// =============================================================================
// Feed State
// =============================================================================

/// Upstream feed status shared with health reporting.
#[derive(Debug)]
pub struct FeedState {
    state: parking_lot::RwLock<ConnectionState>,
    last_connected_at: parking_lot::RwLock<Option<DateTime<Utc>>>,
    error_message: parking_lot::RwLock<Option<String>>,
    reconnect_attempts: AtomicI32,
    messages_received: AtomicU64,
}

impl Default for FeedState {
    fn default() -> Self {
        Self::new()
    }
}

impl FeedState {
    /// Create state for a feed that has not connected yet.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: parking_lot::RwLock::new(ConnectionState::Disconnected),
            last_connected_at: parking_lot::RwLock::new(None),
            error_message: parking_lot::RwLock::new(None),
            reconnect_attempts: AtomicI32::new(0),
            messages_received: AtomicU64::new(0),
        }
    }

    /// Set the connection state.
    pub fn set_state(&self, state: ConnectionState) {
        *self.state.write() = state;
        if state == ConnectionState::Connected {
            *self.last_connected_at.write() = Some(Utc::now());
            self.reconnect_attempts.store(0, Ordering::Relaxed);
            *self.error_message.write() = None;
        }
    }

    /// Set an error state with message.
    pub fn set_error(&self, message: String) {
        *self.state.write() = ConnectionState::Error;
        *self.error_message.write() = Some(message);
    }

    /// Increment reconnect attempts.
    pub fn increment_reconnect_attempts(&self) {
        self.reconnect_attempts.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment the accepted-update counter.
    pub fn increment_messages(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the current connection state.
    #[must_use]
    pub fn get_state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Get the accepted-update count.
    #[must_use]
    pub fn get_messages_received(&self) -> u64 {
        self.messages_received.load(Ordering::Relaxed)
    }

    /// Get the reconnect-attempt count since the last successful connect.
    #[must_use]
    pub fn get_reconnect_attempts(&self) -> i32 {
        self.reconnect_attempts.load(Ordering::Relaxed)
    }

    /// Get the last error message, if any.
    #[must_use]
    pub fn get_error_message(&self) -> Option<String> {
        self.error_message.read().clone()
    }
}

// =============================================================================
// Relay Service
// =============================================================================

/// The state-owning relay pipeline.
///
/// Owns the [`QuoteBook`] exclusively. Every accepted update mutates
/// the book, serializes the full snapshot once, and fans the identical
/// payload out to all attached subscribers.
pub struct RelayService {
    registry: Arc<InstrumentRegistry>,
    rates: RateHandle,
    hub: Arc<BroadcastHub>,
    feed: Arc<FeedState>,
    book: QuoteBook,
}

impl RelayService {
    /// Create a relay pipeline over the given collaborators.
    #[must_use]
    pub fn new(
        registry: Arc<InstrumentRegistry>,
        rates: RateHandle,
        hub: Arc<BroadcastHub>,
        feed: Arc<FeedState>,
    ) -> Self {
        Self {
            registry,
            rates,
            hub,
            feed,
            book: QuoteBook::new(),
        }
    }

    /// Consume feed events until the connector drops its sender.
    pub async fn run(mut self, mut events: mpsc::Receiver<FeedEvent>) {
        while let Some(event) = events.recv().await {
            self.handle_event(event);
        }
        tracing::debug!("feed event channel closed, relay pipeline stopping");
    }

    fn handle_event(&mut self, event: FeedEvent) {
        match event {
            FeedEvent::Connecting => {
                self.feed.set_state(ConnectionState::Connecting);
            }
            FeedEvent::Connected => {
                self.feed.set_state(ConnectionState::Connected);
                tracing::info!("upstream feed connected");
            }
            FeedEvent::Disconnected => {
                self.feed.set_state(ConnectionState::Disconnected);
                tracing::warn!("upstream feed disconnected");
            }
            FeedEvent::Reconnecting { attempt } => {
                self.feed.set_state(ConnectionState::Reconnecting);
                self.feed.increment_reconnect_attempts();
                metrics::record_reconnect();
                tracing::info!(attempt, "upstream feed reconnecting");
            }
            FeedEvent::Error(message) => {
                self.feed.set_error(message.clone());
                tracing::error!(error = %message, "upstream feed error");
            }
            FeedEvent::Ticker(update) => self.on_ticker(&update),
        }
    }

    /// Normalize, store and broadcast one per-instrument update.
    fn on_ticker(&mut self, update: &TickerUpdate) {
        let Some(instrument) = self.registry.resolve(&update.upstream_symbol) else {
            metrics::record_update_discarded(DiscardReason::UnknownSymbol);
            tracing::trace!(
                symbol = %update.upstream_symbol,
                "update for untracked symbol discarded"
            );
            return;
        };

        let started = Instant::now();

        self.book.apply(instrument, update, self.rates.current());
        self.feed.increment_messages();
        metrics::record_update_received();

        match serde_json::to_string(self.book.snapshot()) {
            Ok(payload) => {
                let delivered = self.hub.broadcast(payload.into());
                metrics::record_broadcast(delivered);
                metrics::record_fanout_duration(started.elapsed());
                tracing::trace!(
                    records = self.book.len(),
                    delivered,
                    "snapshot broadcast"
                );
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize snapshot");
            }
        }
    }
}
