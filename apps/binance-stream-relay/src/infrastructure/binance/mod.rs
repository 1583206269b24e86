//! Binance WebSocket Adapter
//!
//! Implements the upstream feed connector against Binance's combined
//! ticker stream:
//!
//! - **messages**: wire format types for combined-stream frames
//! - **codec**: JSON decoding with silent discard of non-ticker frames
//! - **reconnect**: fixed-delay reconnection policy
//! - **ticker**: the connection-lifecycle client

pub mod codec;
pub mod messages;
pub mod reconnect;
pub mod ticker;

pub use codec::{CodecError, JsonCodec};
pub use messages::{BinanceMessage, TickerMessage, combined_stream_path};
pub use reconnect::{ReconnectConfig, ReconnectPolicy};
pub use ticker::{TickerClient, TickerClientConfig, TickerClientError};
