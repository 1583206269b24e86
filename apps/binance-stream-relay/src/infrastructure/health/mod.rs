//! Health Check and Metrics Endpoint
//!
//! HTTP endpoint for health checks, upstream connection status and
//! Prometheus metrics. Used by container orchestrators, load balancers
//! and monitoring systems.
//!
//! # Endpoints
//!
//! - `GET /health` - Returns JSON health status
//! - `GET /healthz` - Kubernetes liveness probe (simple OK)
//! - `GET /readyz` - Kubernetes readiness probe (checks the upstream feed)
//! - `GET /metrics` - Prometheus metrics in text format

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::application::ports::ConnectionState;
use crate::application::services::relay::FeedState;
use crate::infrastructure::broadcast::SharedBroadcastHub;
use crate::infrastructure::metrics::get_metrics_handle;

// =============================================================================
// Health Response Types
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Overall status: "healthy", "degraded", or "unhealthy".
    pub status: HealthStatus,
    /// Relay version.
    pub version: String,
    /// Server uptime in seconds.
    pub uptime_secs: u64,
    /// Current time.
    pub current_time: DateTime<Utc>,
    /// Upstream feed status.
    pub feed: FeedInfo,
    /// Attached subscriber count.
    pub subscribers: SubscriberStatus,
}

/// Overall health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Upstream feed connected, relay operational.
    Healthy,
    /// Feed recovering (dialing or waiting out the reconnect delay).
    Degraded,
    /// Feed down with no recovery in progress.
    Unhealthy,
}

/// Upstream feed status.
#[derive(Debug, Clone, Serialize)]
pub struct FeedInfo {
    /// Connection state.
    pub state: String,
    /// Whether the feed is connected.
    pub connected: bool,
    /// Accepted updates count.
    pub messages_received: u64,
    /// Current reconnect attempts (0 if connected).
    pub reconnect_attempts: i32,
    /// Last feed error, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// Attached subscriber information.
#[derive(Debug, Clone, Serialize)]
pub struct SubscriberStatus {
    /// Total attached WebSocket subscribers.
    pub total: usize,
}

// =============================================================================
// Health Server State
// =============================================================================

/// Shared state for the health server.
pub struct HealthServerState {
    version: String,
    started_at: Instant,
    feed: Arc<FeedState>,
    hub: SharedBroadcastHub,
}

impl HealthServerState {
    /// Create new health server state.
    #[must_use]
    pub fn new(version: String, feed: Arc<FeedState>, hub: SharedBroadcastHub) -> Self {
        Self {
            version,
            started_at: Instant::now(),
            feed,
            hub,
        }
    }
}

// =============================================================================
// Health Server
// =============================================================================

/// Health check HTTP server.
pub struct HealthServer {
    port: u16,
    state: Arc<HealthServerState>,
    cancel: CancellationToken,
}

impl HealthServer {
    /// Create a new health server.
    #[must_use]
    pub const fn new(port: u16, state: Arc<HealthServerState>, cancel: CancellationToken) -> Self {
        Self {
            port,
            state,
            cancel,
        }
    }

    /// Run the health server until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `HealthServerError` if binding fails or the HTTP server
    /// encounters a fatal error while running.
    pub async fn run(self) -> Result<(), HealthServerError> {
        let app = Router::new()
            .route("/health", get(health_handler))
            .route("/healthz", get(liveness_handler))
            .route("/readyz", get(readiness_handler))
            .route("/metrics", get(metrics_handler))
            .with_state(self.state);

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| HealthServerError::BindFailed(self.port, e.to_string()))?;

        tracing::info!(port = self.port, "Health server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(self.cancel.cancelled_owned())
            .await
            .map_err(|e| HealthServerError::ServerFailed(e.to_string()))?;

        tracing::info!("Health server stopped");
        Ok(())
    }
}

// =============================================================================
// HTTP Handlers
// =============================================================================

async fn health_handler(State(state): State<Arc<HealthServerState>>) -> impl IntoResponse {
    let response = build_health_response(&state);
    let status_code = match response.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status_code, Json(response))
}

async fn liveness_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn readiness_handler(State(state): State<Arc<HealthServerState>>) -> impl IntoResponse {
    let response = build_health_response(&state);

    if response.feed.connected {
        (StatusCode::OK, "READY")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
    }
}

async fn metrics_handler() -> impl IntoResponse {
    get_metrics_handle().map_or_else(
        || {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [("content-type", "text/plain")],
                "Metrics not initialized".to_string(),
            )
        },
        |handle| {
            let body = handle.render();
            (
                StatusCode::OK,
                [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
                body,
            )
        },
    )
}

fn build_health_response(state: &HealthServerState) -> HealthResponse {
    let feed = feed_state_to_info(&state.feed);
    let status = determine_health_status(&feed);

    HealthResponse {
        status,
        version: state.version.clone(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        current_time: Utc::now(),
        feed,
        subscribers: SubscriberStatus {
            total: state.hub.subscriber_count(),
        },
    }
}

fn feed_state_to_info(state: &FeedState) -> FeedInfo {
    let connection_state = state.get_state();

    FeedInfo {
        state: connection_state_to_string(connection_state).to_string(),
        connected: connection_state == ConnectionState::Connected,
        messages_received: state.get_messages_received(),
        reconnect_attempts: state.get_reconnect_attempts(),
        last_error: state.get_error_message(),
    }
}

const fn connection_state_to_string(state: ConnectionState) -> &'static str {
    match state {
        ConnectionState::Disconnected => "disconnected",
        ConnectionState::Connecting => "connecting",
        ConnectionState::Connected => "connected",
        ConnectionState::Reconnecting => "reconnecting",
        ConnectionState::Error => "error",
    }
}

fn determine_health_status(feed: &FeedInfo) -> HealthStatus {
    if feed.connected {
        HealthStatus::Healthy
    } else {
        match feed.state.as_str() {
            "connecting" | "reconnecting" => HealthStatus::Degraded,
            _ => HealthStatus::Unhealthy,
        }
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Health server errors.
#[derive(Debug, thiserror::Error)]
pub enum HealthServerError {
    /// Failed to bind to port.
    #[error("failed to bind to port {0}: {1}")]
    BindFailed(u16, String),

    /// Server error.
    #[error("server error: {0}")]
    ServerFailed(String),
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn info(state: &str, connected: bool) -> FeedInfo {
        FeedInfo {
            state: state.to_string(),
            connected,
            messages_received: 0,
            reconnect_attempts: 0,
            last_error: None,
        }
    }

    #[test]
    fn health_status_serialization() {
        assert_eq!(
            serde_json::to_string(&HealthStatus::Healthy).unwrap(),
            "\"healthy\""
        );
        assert_eq!(
            serde_json::to_string(&HealthStatus::Degraded).unwrap(),
            "\"degraded\""
        );
        assert_eq!(
            serde_json::to_string(&HealthStatus::Unhealthy).unwrap(),
            "\"unhealthy\""
        );
    }

    #[test]
    fn connected_feed_is_healthy() {
        assert_eq!(
            determine_health_status(&info("connected", true)),
            HealthStatus::Healthy
        );
    }

    #[test]
    fn recovering_feed_is_degraded() {
        assert_eq!(
            determine_health_status(&info("reconnecting", false)),
            HealthStatus::Degraded
        );
        assert_eq!(
            determine_health_status(&info("connecting", false)),
            HealthStatus::Degraded
        );
    }

    #[test]
    fn down_feed_is_unhealthy() {
        assert_eq!(
            determine_health_status(&info("disconnected", false)),
            HealthStatus::Unhealthy
        );
        assert_eq!(
            determine_health_status(&info("error", false)),
            HealthStatus::Unhealthy
        );
    }

    #[test]
    fn feed_info_reflects_state() {
        let state = FeedState::new();
        state.set_state(ConnectionState::Connected);
        state.increment_messages();
        state.increment_messages();

        let feed_info = feed_state_to_info(&state);
        assert!(feed_info.connected);
        assert_eq!(feed_info.state, "connected");
        assert_eq!(feed_info.messages_received, 2);
        assert!(feed_info.last_error.is_none());
    }
}
