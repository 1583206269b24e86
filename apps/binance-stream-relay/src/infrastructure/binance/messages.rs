//! Binance WebSocket Message Types
//!
//! Wire format types for deserializing frames from Binance's combined
//! stream endpoint. These types map directly to Binance's JSON message
//! schemas.
//!
//! # Frame shape
//!
//! The combined stream wraps every payload in an envelope naming the
//! originating stream:
//!
//! ```json
//! {"stream": "btcusdt@ticker", "data": {"e": "24hrTicker", ...}}
//! ```
//!
//! Control responses (subscription acks and the like) arrive as naked
//! objects without a `data` member and are not per-instrument updates.
//!
//! # References
//!
//! - [WebSocket Streams](https://developers.binance.com/docs/binance-spot-api-docs/web-socket-streams)

use serde::{Deserialize, Serialize};

use crate::domain::instrument::InstrumentRegistry;
use crate::domain::quote::TickerUpdate;

/// Event type tag of a per-instrument 24h ticker payload.
pub const TICKER_EVENT: &str = "24hrTicker";

/// Build the multiplexed subscription path for every registry entry.
///
/// One physical connection carries all instruments: the path joins
/// `{symbol}{quote}@ticker` segments (lowercased) with `/`, e.g.
/// `btcusdt@ticker/ethusdt@ticker`.
#[must_use]
pub fn combined_stream_path(registry: &InstrumentRegistry) -> String {
    registry
        .iter()
        .map(|instrument| {
            format!(
                "{}@ticker",
                registry.upstream_symbol(instrument).to_lowercase()
            )
        })
        .collect::<Vec<_>>()
        .join("/")
}

// =============================================================================
// Decoded Messages
// =============================================================================

/// A decoded upstream frame.
#[derive(Debug, Clone)]
pub enum BinanceMessage {
    /// A per-instrument 24h ticker update.
    Ticker(TickerMessage),
    /// Anything that is not a per-instrument update (control acks,
    /// other event types). Discarded silently by the client.
    Other,
}

/// A 24-hour rolling ticker payload.
///
/// Binance encodes numeric fields as JSON strings. Every field beyond
/// the symbol is optional here so that a frame with a missing or
/// garbled field still decodes; the normalizer fills gaps from the
/// previous record.
///
/// # Wire Format (JSON)
/// ```json
/// {
///   "e": "24hrTicker",
///   "E": 1672515782136,
///   "s": "BTCUSDT",
///   "c": "16580.00",
///   "P": "1.24",
///   "h": "16700.00",
///   "l": "16250.00",
///   "v": "123456.78"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickerMessage {
    /// Event type (always `24hrTicker` for this payload)
    #[serde(rename = "e")]
    pub event_type: String,

    /// Event time in epoch milliseconds
    #[serde(rename = "E", default)]
    pub event_time: Option<u64>,

    /// Upstream symbol (e.g. `BTCUSDT`)
    #[serde(rename = "s")]
    pub symbol: String,

    /// Last traded price
    #[serde(rename = "c", default)]
    pub last_price: Option<String>,

    /// 24h price change percent
    #[serde(rename = "P", default)]
    pub change_percent: Option<String>,

    /// 24h high price
    #[serde(rename = "h", default)]
    pub high_price: Option<String>,

    /// 24h low price
    #[serde(rename = "l", default)]
    pub low_price: Option<String>,

    /// 24h traded volume
    #[serde(rename = "v", default)]
    pub volume: Option<String>,
}

impl TickerMessage {
    /// Convert the wire payload into a domain update.
    ///
    /// A field that is absent, or present but not parseable as a
    /// number, becomes `None` and is treated as missing downstream.
    #[must_use]
    pub fn to_update(&self) -> TickerUpdate {
        TickerUpdate {
            upstream_symbol: self.symbol.clone(),
            last_price: parse_numeric(self.last_price.as_deref()),
            change_percent_24h: parse_numeric(self.change_percent.as_deref()),
            high_24h: parse_numeric(self.high_price.as_deref()),
            low_24h: parse_numeric(self.low_price.as_deref()),
            volume: parse_numeric(self.volume.as_deref()),
        }
    }
}

fn parse_numeric(field: Option<&str>) -> Option<f64> {
    field.and_then(|s| s.parse().ok())
}
