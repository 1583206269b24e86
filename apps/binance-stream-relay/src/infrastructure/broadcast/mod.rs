//! Broadcast Fan-out and Subscriber Registry
//!
//! Delivers each serialized snapshot to every attached subscriber and
//! tracks subscriber attach/detach.
//!
//! # Architecture
//!
//! The [`BroadcastHub`] holds one buffered channel sender per attached
//! subscriber. A broadcast is a single non-blocking pass over the
//! registry: the payload is serialized once by the relay pipeline and
//! shared (`Arc<str>`) across subscribers, a subscriber whose buffer is
//! full is skipped for that frame (latest state wins, no retry), and a
//! subscriber whose receiver is gone is detached during the same pass.
//! A slow or dead subscriber therefore never delays the upstream path
//! or the other subscribers.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use uuid::Uuid;

use crate::infrastructure::config::BroadcastSettings;
use crate::infrastructure::metrics;

/// A serialized snapshot payload, shared across subscribers.
pub type SnapshotFrame = Arc<str>;

/// Shared broadcast hub reference.
pub type SharedBroadcastHub = Arc<BroadcastHub>;

// =============================================================================
// Subscriber Identity
// =============================================================================

/// Opaque identifier for an attached subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(Uuid);

impl SubscriberId {
    fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

// =============================================================================
// Broadcast Hub
// =============================================================================

/// Configuration for the broadcast hub.
#[derive(Debug, Clone, Copy)]
pub struct BroadcastConfig {
    /// Per-subscriber frame buffer capacity.
    pub subscriber_buffer: usize,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            subscriber_buffer: 32,
        }
    }
}

impl From<BroadcastSettings> for BroadcastConfig {
    fn from(settings: BroadcastSettings) -> Self {
        Self {
            subscriber_buffer: settings.subscriber_buffer,
        }
    }
}

struct Subscriber {
    id: SubscriberId,
    tx: mpsc::Sender<SnapshotFrame>,
}

/// Subscriber registry plus fan-out.
///
/// Purely additive/removal bookkeeping: the hub holds no per-subscriber
/// state beyond the transport handle, and a newly attached subscriber
/// sees only the next broadcast - no backlog is replayed.
pub struct BroadcastHub {
    config: BroadcastConfig,
    subscribers: parking_lot::RwLock<Vec<Subscriber>>,
}

impl BroadcastHub {
    /// Create a hub with the given configuration.
    #[must_use]
    pub fn new(config: BroadcastConfig) -> Self {
        Self {
            config,
            subscribers: parking_lot::RwLock::new(Vec::new()),
        }
    }

    /// Create a hub with default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(BroadcastConfig::default())
    }

    /// Register a new subscriber.
    ///
    /// Returns the subscriber's id and the receiving end of its frame
    /// channel.
    #[must_use]
    pub fn attach(&self) -> (SubscriberId, mpsc::Receiver<SnapshotFrame>) {
        let (tx, rx) = mpsc::channel(self.config.subscriber_buffer);
        let id = SubscriberId::generate();

        let mut subscribers = self.subscribers.write();
        subscribers.push(Subscriber { id, tx });
        metrics::set_subscribers(subscribers.len());

        (id, rx)
    }

    /// Remove a subscriber on explicit close.
    ///
    /// Returns whether the subscriber was still registered.
    pub fn detach(&self, id: SubscriberId) -> bool {
        let mut subscribers = self.subscribers.write();
        let before = subscribers.len();
        subscribers.retain(|s| s.id != id);
        metrics::set_subscribers(subscribers.len());
        subscribers.len() < before
    }

    /// Push one frame to every open subscriber.
    ///
    /// Best-effort: subscribers whose receiver is gone are detached
    /// during the pass, subscribers whose buffer is full are skipped
    /// for this frame. Returns the number of subscribers the frame was
    /// delivered to.
    pub fn broadcast(&self, frame: SnapshotFrame) -> usize {
        let mut subscribers = self.subscribers.write();
        let mut delivered = 0;

        subscribers.retain(|subscriber| match subscriber.tx.try_send(frame.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                tracing::debug!(subscriber = %subscriber.id, "subscriber lagging, frame dropped");
                true
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(subscriber = %subscriber.id, "subscriber gone, detaching");
                false
            }
        });

        metrics::set_subscribers(subscribers.len());
        delivered
    }

    /// Number of currently attached subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Get statistics about the hub.
    #[must_use]
    pub fn stats(&self) -> BroadcastStats {
        BroadcastStats {
            subscribers: self.subscriber_count(),
        }
    }
}

/// Statistics about the broadcast hub.
#[derive(Debug, Clone, Copy, Default)]
pub struct BroadcastStats {
    /// Number of attached subscribers.
    pub subscribers: usize,
}

// =============================================================================
// Tests
// =============================================================================
