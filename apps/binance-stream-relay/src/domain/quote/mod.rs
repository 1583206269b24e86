//! Quote Records and the Quote Book
//!
//! The normalized, display-ready state for each tracked instrument and
//! the single authoritative in-memory store holding it.
//!
//! # Single-writer discipline
//!
//! The [`QuoteBook`] carries no internal locking: only the relay
//! pipeline task mutates it, and the broadcast payload is serialized on
//! that same task immediately after each mutation, so every snapshot is
//! a consistent point-in-time view.

use serde::{Deserialize, Serialize};

use super::instrument::Instrument;

// =============================================================================
// Raw Update
// =============================================================================

/// A decoded per-instrument update as received from upstream, before
/// normalization.
///
/// Numeric fields are optional: the upstream feed omits or garbles
/// individual fields on occasion, and a missing field must never
/// overwrite previously known data.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickerUpdate {
    /// Identifier as reported upstream (e.g. `BTCUSDT`).
    pub upstream_symbol: String,
    /// Last traded price, in the upstream quote currency.
    pub last_price: Option<f64>,
    /// 24-hour percentage change (currency-invariant).
    pub change_percent_24h: Option<f64>,
    /// 24-hour high, in the upstream quote currency.
    pub high_24h: Option<f64>,
    /// 24-hour low, in the upstream quote currency.
    pub low_24h: Option<f64>,
    /// 24-hour traded volume, in the upstream quote currency.
    pub volume: Option<f64>,
}

// =============================================================================
// Quote Record
// =============================================================================

/// The normalized, display-ready state for one instrument.
///
/// All prices are expressed in the display currency. Serialized field
/// names are the downstream wire contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteRecord {
    /// Upstream identifier (e.g. `BTCUSDT`).
    pub id: String,
    /// Canonical symbol (e.g. `BTC`).
    pub symbol: String,
    /// Display name.
    pub name: String,
    /// Current price in the display currency.
    pub current_price: f64,
    /// 24-hour percentage change.
    pub price_change_percentage_24h: f64,
    /// 24-hour high in the display currency.
    pub high_24h: f64,
    /// 24-hour low in the display currency.
    pub low_24h: f64,
    /// 24-hour volume in the display currency.
    pub volume: f64,
    /// Icon URL.
    pub image: String,
}

/// Build a [`QuoteRecord`] from a raw update.
///
/// Price, high, low and volume are converted to the display currency
/// with `rate`; the percentage change passes through unchanged. Fields
/// absent from the update inherit the previous record's value, so valid
/// data is never overwritten by missing data; with no previous record a
/// missing field becomes `0.0` rather than being left unset.
#[must_use]
pub fn normalize(
    instrument: &Instrument,
    update: &TickerUpdate,
    rate: f64,
    previous: Option<&QuoteRecord>,
) -> QuoteRecord {
    QuoteRecord {
        id: update.upstream_symbol.clone(),
        symbol: instrument.symbol.clone(),
        name: instrument.name.clone(),
        current_price: update
            .last_price
            .map(|v| v * rate)
            .unwrap_or_else(|| previous.map_or(0.0, |p| p.current_price)),
        price_change_percentage_24h: update
            .change_percent_24h
            .unwrap_or_else(|| previous.map_or(0.0, |p| p.price_change_percentage_24h)),
        high_24h: update
            .high_24h
            .map(|v| v * rate)
            .unwrap_or_else(|| previous.map_or(0.0, |p| p.high_24h)),
        low_24h: update
            .low_24h
            .map(|v| v * rate)
            .unwrap_or_else(|| previous.map_or(0.0, |p| p.low_24h)),
        volume: update
            .volume
            .map(|v| v * rate)
            .unwrap_or_else(|| previous.map_or(0.0, |p| p.volume)),
        image: instrument.image.clone(),
    }
}

// =============================================================================
// Quote Book
// =============================================================================

/// The single authoritative mapping from instrument identifier to its
/// latest [`QuoteRecord`].
///
/// Holds at most one record per identifier. New identifiers are
/// appended in first-seen order; updates to known identifiers replace
/// the record in place without reordering, so snapshot ordering is
/// stable for the process lifetime.
#[derive(Debug, Default)]
pub struct QuoteBook {
    records: Vec<QuoteRecord>,
    index: std::collections::HashMap<String, usize>,
}

impl QuoteBook {
    /// Create an empty book.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the record for its identifier.
    pub fn upsert(&mut self, record: QuoteRecord) {
        if let Some(&position) = self.index.get(&record.id) {
            self.records[position] = record;
        } else {
            self.index.insert(record.id.clone(), self.records.len());
            self.records.push(record);
        }
    }

    /// Normalize a raw update against the previous record (if any) and
    /// upsert the result.
    pub fn apply(&mut self, instrument: &Instrument, update: &TickerUpdate, rate: f64) {
        let previous = self.get(&update.upstream_symbol);
        let record = normalize(instrument, update, rate, previous);
        self.upsert(record);
    }

    /// Look up the current record for an identifier.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&QuoteRecord> {
        self.index.get(id).map(|&i| &self.records[i])
    }

    /// All current records, in first-seen order.
    #[must_use]
    pub fn snapshot(&self) -> &[QuoteRecord] {
        &self.records
    }

    /// Number of records held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the book holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn btc() -> Instrument {
        Instrument::major("BTC")
    }

    fn update(symbol: &str, price: f64) -> TickerUpdate {
        TickerUpdate {
            upstream_symbol: symbol.to_string(),
            last_price: Some(price),
            change_percent_24h: Some(1.5),
            high_24h: Some(price + 10.0),
            low_24h: Some(price - 10.0),
            volume: Some(1000.0),
        }
    }

    #[test]
    fn normalize_applies_rate_to_prices_only() {
        let record = normalize(&btc(), &update("BTCUSDT", 100.0), 83.0, None);
        assert!((record.current_price - 8300.0).abs() < f64::EPSILON);
        assert!((record.high_24h - 110.0 * 83.0).abs() < f64::EPSILON);
        assert!((record.low_24h - 90.0 * 83.0).abs() < f64::EPSILON);
        assert!((record.volume - 1000.0 * 83.0).abs() < f64::EPSILON);
        // Percentage change is currency-invariant.
        assert!((record.price_change_percentage_24h - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn normalize_carries_display_metadata() {
        let record = normalize(&btc(), &update("BTCUSDT", 100.0), 1.0, None);
        assert_eq!(record.id, "BTCUSDT");
        assert_eq!(record.symbol, "BTC");
        assert_eq!(record.name, "BTC");
        assert_eq!(record.image, "https://cryptoicons.org/api/icon/btc/200");
    }

    #[test]
    fn missing_field_inherits_previous_value() {
        let mut book = QuoteBook::new();
        book.apply(&btc(), &update("BTCUSDT", 100.0), 1.0);

        let partial = TickerUpdate {
            upstream_symbol: "BTCUSDT".to_string(),
            last_price: Some(105.0),
            high_24h: None,
            ..TickerUpdate::default()
        };
        book.apply(&btc(), &partial, 1.0);

        let record = book.get("BTCUSDT").unwrap();
        assert!((record.current_price - 105.0).abs() < f64::EPSILON);
        // High from the first update survives the second.
        assert!((record.high_24h - 110.0).abs() < f64::EPSILON);
        assert!((record.volume - 1000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn missing_field_without_history_is_zero() {
        let partial = TickerUpdate {
            upstream_symbol: "BTCUSDT".to_string(),
            last_price: Some(100.0),
            ..TickerUpdate::default()
        };
        let record = normalize(&btc(), &partial, 83.0, None);
        assert!((record.volume - 0.0).abs() < f64::EPSILON);
        assert!((record.high_24h - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn upsert_preserves_first_seen_order() {
        let mut book = QuoteBook::new();
        book.apply(&btc(), &update("BTCUSDT", 100.0), 1.0);
        book.apply(&Instrument::major("ETH"), &update("ETHUSDT", 10.0), 1.0);
        // ETH updating again must not move it ahead of BTC.
        book.apply(&Instrument::major("ETH"), &update("ETHUSDT", 11.0), 1.0);

        let ids: Vec<&str> = book.snapshot().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["BTCUSDT", "ETHUSDT"]);
        assert!((book.get("ETHUSDT").unwrap().current_price - 11.0).abs() < f64::EPSILON);
    }

    #[test]
    fn serialized_field_names_match_wire_contract() {
        let record = normalize(&btc(), &update("BTCUSDT", 100.0), 1.0, None);
        let json = serde_json::to_value(&record).unwrap();
        for key in [
            "id",
            "symbol",
            "name",
            "current_price",
            "price_change_percentage_24h",
            "high_24h",
            "low_24h",
            "volume",
            "image",
        ] {
            assert!(json.get(key).is_some(), "missing field {key}");
        }
    }

    proptest! {
        /// Arbitrary update sequences never produce duplicate identifiers,
        /// and first-seen iteration order is stable.
        #[test]
        fn book_holds_one_record_per_id(symbols in proptest::collection::vec(0usize..8, 1..64)) {
            let names = ["BTC", "ETH", "BNB", "XRP", "ADA", "DOGE", "SOL", "DOT"];
            let mut book = QuoteBook::new();
            let mut first_seen: Vec<String> = Vec::new();

            for (step, &choice) in symbols.iter().enumerate() {
                let symbol = names[choice];
                let upstream = format!("{symbol}USDT");
                if !first_seen.contains(&upstream) {
                    first_seen.push(upstream.clone());
                }
                #[allow(clippy::cast_precision_loss)]
                book.apply(&Instrument::major(symbol), &update(&upstream, step as f64 + 1.0), 1.0);
            }

            let ids: Vec<String> = book.snapshot().iter().map(|r| r.id.clone()).collect();
            prop_assert_eq!(ids, first_seen);

            let mut unique: Vec<&str> = book.snapshot().iter().map(|r| r.id.as_str()).collect();
            unique.sort_unstable();
            unique.dedup();
            prop_assert_eq!(unique.len(), book.len());
        }
    }
}
