//! Application Services
//!
//! Services that orchestrate domain logic between ports.
//!
//! - `relay`: the single state-owning pipeline task that turns decoded
//!   upstream updates into broadcast snapshots

pub mod relay;

pub use relay::{FeedState, RelayService};
