//! Relay Configuration Settings
//!
//! Configuration types for the relay, loaded from environment
//! variables. Every value has a default; the service runs with no
//! environment at all.

use std::time::Duration;

/// Upstream feed settings.
#[derive(Debug, Clone)]
pub struct FeedSettings {
    /// Base WebSocket URL of the upstream exchange.
    pub upstream_url: String,
    /// Quote asset the upstream prices against (stripped from
    /// upstream identifiers to recover canonical symbols).
    pub quote_asset: String,
    /// Delay between a detected disconnect and the next connect attempt.
    pub reconnect_delay: Duration,
    /// Maximum reconnection attempts before giving up (0 = unlimited).
    pub max_reconnect_attempts: u32,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            upstream_url: "wss://stream.binance.com:9443".to_string(),
            quote_asset: "USDT".to_string(),
            reconnect_delay: Duration::from_secs(5),
            max_reconnect_attempts: 0, // Unlimited
        }
    }
}

/// Currency-rate provider settings.
#[derive(Debug, Clone)]
pub struct RateSettings {
    /// Simple-price endpoint queried for the display rate.
    pub endpoint: String,
    /// Refresh interval.
    pub refresh_interval: Duration,
    /// Request timeout.
    pub request_timeout: Duration,
    /// Rate used until the first successful refresh.
    pub fallback_rate: f64,
}

impl Default for RateSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://api.coingecko.com/api/v3/simple/price?ids=tether&vs_currencies=inr"
                .to_string(),
            refresh_interval: Duration::from_secs(300),
            request_timeout: Duration::from_secs(10),
            fallback_rate: 83.0,
        }
    }
}

/// Broadcast settings.
#[derive(Debug, Clone)]
pub struct BroadcastSettings {
    /// Per-subscriber frame buffer capacity.
    pub subscriber_buffer: usize,
}

impl Default for BroadcastSettings {
    fn default() -> Self {
        Self {
            subscriber_buffer: 32,
        }
    }
}

/// Server port settings.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Subscriber WebSocket port.
    pub ws_port: u16,
    /// Health check HTTP port (also serves `/metrics`).
    pub health_port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            ws_port: 8080,
            health_port: 8082,
        }
    }
}

/// Complete relay configuration.
#[derive(Debug, Clone, Default)]
pub struct RelayConfig {
    /// Upstream feed settings.
    pub feed: FeedSettings,
    /// Currency-rate provider settings.
    pub rates: RateSettings,
    /// Server port settings.
    pub server: ServerSettings,
    /// Broadcast settings.
    pub broadcast: BroadcastSettings,
}

impl RelayConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a provided value is empty or malformed in a
    /// way that cannot be defaulted (the upstream URL scheme).
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let upstream_url = match std::env::var("STREAM_RELAY_UPSTREAM_URL") {
            Ok(url) if url.is_empty() => {
                return Err(ConfigError::EmptyValue("STREAM_RELAY_UPSTREAM_URL".to_string()));
            }
            Ok(url) if !url.starts_with("ws://") && !url.starts_with("wss://") => {
                return Err(ConfigError::InvalidValue {
                    key: "STREAM_RELAY_UPSTREAM_URL".to_string(),
                    value: url,
                });
            }
            Ok(url) => url,
            Err(_) => defaults.feed.upstream_url,
        };

        let quote_asset = match std::env::var("STREAM_RELAY_QUOTE_ASSET") {
            Ok(asset) if asset.is_empty() => {
                return Err(ConfigError::EmptyValue("STREAM_RELAY_QUOTE_ASSET".to_string()));
            }
            Ok(asset) => asset,
            Err(_) => defaults.feed.quote_asset,
        };

        let feed = FeedSettings {
            upstream_url,
            quote_asset,
            reconnect_delay: parse_env_duration_millis(
                "STREAM_RELAY_RECONNECT_DELAY_MS",
                defaults.feed.reconnect_delay,
            ),
            max_reconnect_attempts: parse_env_u32(
                "STREAM_RELAY_MAX_RECONNECT_ATTEMPTS",
                defaults.feed.max_reconnect_attempts,
            ),
        };

        let rates = RateSettings {
            endpoint: std::env::var("STREAM_RELAY_RATE_ENDPOINT")
                .unwrap_or(defaults.rates.endpoint),
            refresh_interval: parse_env_duration_secs(
                "STREAM_RELAY_RATE_REFRESH_SECS",
                defaults.rates.refresh_interval,
            ),
            request_timeout: parse_env_duration_secs(
                "STREAM_RELAY_RATE_TIMEOUT_SECS",
                defaults.rates.request_timeout,
            ),
            fallback_rate: parse_env_f64(
                "STREAM_RELAY_FALLBACK_RATE",
                defaults.rates.fallback_rate,
            ),
        };

        let server = ServerSettings {
            ws_port: parse_env_u16("STREAM_RELAY_WS_PORT", defaults.server.ws_port),
            health_port: parse_env_u16("STREAM_RELAY_HEALTH_PORT", defaults.server.health_port),
        };

        let broadcast = BroadcastSettings {
            subscriber_buffer: parse_env_usize(
                "STREAM_RELAY_SUBSCRIBER_BUFFER",
                defaults.broadcast.subscriber_buffer,
            ),
        };

        Ok(Self {
            feed,
            rates,
            server,
            broadcast,
        })
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// Environment variable value cannot be used.
    #[error("environment variable {key} has invalid value: {value}")]
    InvalidValue {
        /// Variable name.
        key: String,
        /// Rejected value.
        value: String,
    },
}

fn parse_env_u16(key: &str, default: u16) -> u16 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_duration_secs(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_secs)
}

fn parse_env_duration_millis(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_millis)
}
