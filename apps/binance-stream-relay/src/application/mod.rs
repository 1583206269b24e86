//! Application Layer - Use cases and port definitions.
//!
//! This layer contains the relay pipeline service and the port
//! interfaces that define how the domain interacts with external
//! systems.

/// Port interfaces for external systems (upstream feed, rate provider).
pub mod ports;

/// Application services driving the relay pipeline.
pub mod services;
