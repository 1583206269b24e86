//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the concrete implementations of the port
//! interfaces defined in the application layer.

/// Binance WebSocket client adapter (combined ticker stream).
pub mod binance;

/// Subscriber registry and broadcast fan-out.
pub mod broadcast;

/// Configuration loading.
pub mod config;

/// Health check HTTP endpoint.
pub mod health;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// Currency-rate provider adapter and refresher.
pub mod rates;

/// OpenTelemetry tracing integration.
pub mod telemetry;

/// Downstream WebSocket endpoint for subscribers.
pub mod ws;
