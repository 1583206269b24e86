//! Stream Codec Module
//!
//! JSON decoding for Binance combined-stream frames.
//!
//! The codec classifies frames rather than rejecting them: only a
//! frame that is not valid JSON is an error. A well-formed frame that
//! is not a per-instrument ticker update (control acks, other event
//! types) decodes to [`BinanceMessage::Other`] and is discarded
//! silently by the caller.

use serde_json::Value;

use super::messages::{BinanceMessage, TICKER_EVENT, TickerMessage};

/// Codec errors.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// JSON decoding failed.
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid message format.
    #[error("invalid message format: {0}")]
    InvalidFormat(String),
}

/// JSON codec for the combined ticker stream.
#[derive(Debug, Default, Clone)]
pub struct JsonCodec;

impl JsonCodec {
    /// Create a new JSON codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Decode a text frame into a [`BinanceMessage`].
    ///
    /// # Errors
    ///
    /// Returns an error if the frame is not valid JSON or not an
    /// object. Frames that parse but carry no per-instrument update
    /// decode to [`BinanceMessage::Other`], not an error.
    pub fn decode(&self, text: &str) -> Result<BinanceMessage, CodecError> {
        let trimmed = text.trim();

        if !trimmed.starts_with('{') {
            return Err(CodecError::InvalidFormat(format!(
                "expected JSON object, got: {}...",
                &trimmed[..trimmed.len().min(50)]
            )));
        }

        let value: Value = serde_json::from_str(trimmed)?;

        // Control responses ({"result":null,"id":1}) have no envelope.
        let Some(data) = value.get("data") else {
            return Ok(BinanceMessage::Other);
        };

        if data.get("e").and_then(Value::as_str) == Some(TICKER_EVENT) {
            let message: TickerMessage = serde_json::from_value(data.clone())?;
            Ok(BinanceMessage::Ticker(message))
        } else {
            Ok(BinanceMessage::Other)
        }
    }
}
