//! Instrument Registry
//!
//! The fixed set of tracked instruments and their display metadata.
//! The registry is built once at startup from a static list and is
//! never mutated afterwards; both the upstream subscription path and
//! the broadcast snapshot ordering derive from it.
//!
//! # Upstream identifiers
//!
//! The upstream feed reports symbols suffixed with the quote asset
//! (`BTCUSDT` for `BTC` quoted in `USDT`). The registry resolves such
//! identifiers back to the canonical symbol by stripping the configured
//! suffix.

use std::collections::HashMap;

/// A canonical instrument symbol (e.g. `BTC`).
pub type Symbol = String;

/// Icon used when an instrument has no dedicated image.
pub const FALLBACK_ICON: &str = "https://via.placeholder.com/40?text=?";

/// The major coins tracked by default, in display order.
const MAJOR_SYMBOLS: &[&str] = &[
    "BTC", "ETH", "BNB", "XRP", "ADA", "DOGE", "SOL", "DOT", "MATIC", "DAI",
    "TRX", "LTC", "SHIB", "AVAX", "UNI", "WBTC", "LEO", "LINK", "ATOM", "XLM",
    "XMR", "OKB", "ETC", "BCH", "FIL", "APE", "ALGO", "NEAR", "QNT", "HBAR",
    "VET", "FLOW", "LUNC", "LDO", "MANA", "ICP", "EOS", "CHZ", "AXS", "XTZ",
    "SAND", "THETA", "KCS", "BTT", "EGLD", "BSV", "USDP", "AAVE", "ZEC", "GRT",
    "FTM", "MKR", "SNX", "COMP", "SUSHI", "ENJ", "BAT", "WAVES", "QTUM",
    "NANO", "ZIL", "ONT", "SC", "RVN", "DGB", "HOT", "KAVA", "XEM", "LRC",
    "CELO", "HNT", "GLM", "ANKR", "STX", "AR", "MINA", "KLAY", "GALA", "XDC",
    "CVC", "IOST", "ZEN", "LPT", "RSR", "BAL", "OCEAN", "NEXO", "SRM", "BNT",
    "DCR", "WAXP", "XVG",
];

/// Build the icon URL for a symbol.
#[must_use]
pub fn icon_url(symbol: &str) -> String {
    format!(
        "https://cryptoicons.org/api/icon/{}/200",
        symbol.to_lowercase()
    )
}

// =============================================================================
// Instrument
// =============================================================================

/// A tracked instrument: stable identifier plus display metadata.
///
/// Immutable for the process lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instrument {
    /// Canonical symbol (e.g. `BTC`).
    pub symbol: Symbol,
    /// Display name.
    pub name: String,
    /// Icon/reference URL.
    pub image: String,
}

impl Instrument {
    /// Create an instrument with explicit metadata.
    ///
    /// An empty image falls back to [`FALLBACK_ICON`].
    #[must_use]
    pub fn new(
        symbol: impl Into<String>,
        name: impl Into<String>,
        image: impl Into<String>,
    ) -> Self {
        let image = image.into();
        Self {
            symbol: symbol.into(),
            name: name.into(),
            image: if image.is_empty() {
                FALLBACK_ICON.to_string()
            } else {
                image
            },
        }
    }

    /// Create a major-coin instrument where the symbol doubles as the
    /// display name and the icon comes from the standard icon service.
    #[must_use]
    pub fn major(symbol: &str) -> Self {
        Self::new(symbol, symbol, icon_url(symbol))
    }
}

// =============================================================================
// Instrument Registry
// =============================================================================

/// The fixed set of tracked instruments.
///
/// Preserves definition order (which governs nothing downstream by
/// itself - snapshot ordering is first-seen update order - but keeps
/// the subscription path deterministic) and indexes instruments by
/// canonical symbol. Duplicate symbols in the input are ignored after
/// their first occurrence.
#[derive(Debug)]
pub struct InstrumentRegistry {
    instruments: Vec<Instrument>,
    by_symbol: HashMap<Symbol, usize>,
    quote_asset: String,
}

impl InstrumentRegistry {
    /// Create a registry from an explicit instrument list.
    #[must_use]
    pub fn new(
        quote_asset: impl Into<String>,
        instruments: impl IntoIterator<Item = Instrument>,
    ) -> Self {
        let mut list: Vec<Instrument> = Vec::new();
        let mut by_symbol = HashMap::new();

        for instrument in instruments {
            if by_symbol.contains_key(&instrument.symbol) {
                continue;
            }
            by_symbol.insert(instrument.symbol.clone(), list.len());
            list.push(instrument);
        }

        Self {
            instruments: list,
            by_symbol,
            quote_asset: quote_asset.into(),
        }
    }

    /// Create a registry holding the default major-coin set.
    #[must_use]
    pub fn with_majors(quote_asset: impl Into<String>) -> Self {
        Self::new(quote_asset, MAJOR_SYMBOLS.iter().map(|s| Instrument::major(s)))
    }

    /// Look up an instrument by canonical symbol.
    #[must_use]
    pub fn get(&self, symbol: &str) -> Option<&Instrument> {
        self.by_symbol.get(symbol).map(|&i| &self.instruments[i])
    }

    /// Resolve an upstream identifier to an instrument.
    ///
    /// The identifier may carry the quote-asset suffix (`BTCUSDT`);
    /// the suffix is stripped to recover the canonical symbol. An
    /// identifier without the suffix is looked up as-is.
    #[must_use]
    pub fn resolve(&self, upstream_id: &str) -> Option<&Instrument> {
        let canonical = upstream_id
            .strip_suffix(self.quote_asset.as_str())
            .unwrap_or(upstream_id);
        self.get(canonical)
    }

    /// The upstream identifier for an instrument (`BTC` -> `BTCUSDT`).
    #[must_use]
    pub fn upstream_symbol(&self, instrument: &Instrument) -> String {
        format!("{}{}", instrument.symbol, self.quote_asset)
    }

    /// The quote asset the upstream feed prices against.
    #[must_use]
    pub fn quote_asset(&self) -> &str {
        &self.quote_asset
    }

    /// Iterate over instruments in definition order.
    pub fn iter(&self) -> impl Iterator<Item = &Instrument> {
        self.instruments.iter()
    }

    /// Number of tracked instruments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }
}
