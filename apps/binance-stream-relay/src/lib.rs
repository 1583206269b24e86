#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::default_trait_access,
        clippy::items_after_statements
    )
)]

//! Binance Stream Relay - Live Price Multiplexer
//!
//! A relay service that maintains a single connection to Binance's
//! combined ticker stream, keeps the latest display-currency quote for
//! every tracked instrument, and pushes the full consolidated snapshot
//! to every downstream WebSocket subscriber on each update.
//!
//! # Layers (inside -> outside)
//!
//! - **Domain**: Core relay types and state
//!   - `instrument`: the fixed registry of tracked instruments
//!   - `quote`: normalized quote records and the quote book
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: feed event contract, rate provider port
//!   - `services`: the single state-owning relay pipeline
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `binance`: WebSocket client for the combined ticker stream
//!   - `ws`: downstream WebSocket push endpoint
//!   - `broadcast`: subscriber registry and fan-out
//!   - `rates`: display-rate provider and refresher
//!   - `config`: configuration loading
//!   - `health`: health check HTTP endpoint
//!
//! # Data Flow
//!
//! ```text
//! Binance WS ──► Ticker ──► Relay ──► Broadcast ──► Subscriber 1
//!               Client     Pipeline     Hub     ├─► Subscriber 2
//!                        (quote book)           └─► Subscriber N
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core relay types with no transport dependencies.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::instrument::{FALLBACK_ICON, Instrument, InstrumentRegistry, Symbol, icon_url};
pub use domain::quote::{QuoteBook, QuoteRecord, TickerUpdate, normalize};

// Application ports and services
pub use application::ports::{ConnectionState, FeedEvent, RateError, RateHandle, RatePort};
pub use application::services::relay::{FeedState, RelayService};

// Infrastructure config
pub use infrastructure::config::{
    BroadcastSettings, ConfigError, FeedSettings, RateSettings, RelayConfig, ServerSettings,
};

// Health server
pub use infrastructure::health::{HealthServer, HealthServerError, HealthServerState};

// Broadcast hub (for integration tests)
pub use infrastructure::broadcast::{
    BroadcastConfig, BroadcastHub, BroadcastStats, SharedBroadcastHub, SnapshotFrame, SubscriberId,
};

// Upstream client
pub use infrastructure::binance::{
    BinanceMessage, CodecError, JsonCodec, ReconnectConfig, ReconnectPolicy, TickerClient,
    TickerClientConfig, TickerClientError, TickerMessage, combined_stream_path,
};

// Rate provider
pub use infrastructure::rates::{CoinGeckoRates, RateRefresher};

// Downstream endpoint (router exposed for integration tests)
pub use infrastructure::ws::{LIVE_PRICES_PATH, WsServer, WsServerError, router as ws_router};

// Metrics
pub use infrastructure::metrics::{DiscardReason, init_metrics};

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
