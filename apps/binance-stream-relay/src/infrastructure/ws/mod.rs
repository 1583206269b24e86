//! Downstream WebSocket Endpoint
//!
//! Serves the live-price push stream to subscribers. Each connection
//! upgrades at `/ws/live-prices`, attaches to the broadcast hub, and
//! receives every subsequent snapshot frame until it closes.
//!
//! The endpoint is push-only: inbound payloads from subscribers are
//! ignored. There is no backlog replay - a freshly attached subscriber
//! sees only the next broadcast.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    response::Response,
    routing::get,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::infrastructure::broadcast::BroadcastHub;

/// Path subscribers connect to.
pub const LIVE_PRICES_PATH: &str = "/ws/live-prices";

// =============================================================================
// Server
// =============================================================================

/// WebSocket server errors.
#[derive(Debug, thiserror::Error)]
pub enum WsServerError {
    /// Failed to bind to port.
    #[error("failed to bind to port {0}: {1}")]
    BindFailed(u16, String),

    /// Server error.
    #[error("server error: {0}")]
    ServerFailed(String),
}

/// The subscriber-facing WebSocket server.
pub struct WsServer {
    port: u16,
    hub: Arc<BroadcastHub>,
    cancel: CancellationToken,
}

impl WsServer {
    /// Create a new server.
    #[must_use]
    pub const fn new(port: u16, hub: Arc<BroadcastHub>, cancel: CancellationToken) -> Self {
        Self { port, hub, cancel }
    }

    /// Run the server until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `WsServerError` if binding fails or the HTTP server
    /// encounters a fatal error while running.
    pub async fn run(self) -> Result<(), WsServerError> {
        let app = router(self.hub);

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| WsServerError::BindFailed(self.port, e.to_string()))?;

        tracing::info!(port = self.port, path = LIVE_PRICES_PATH, "WebSocket server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(self.cancel.cancelled_owned())
            .await
            .map_err(|e| WsServerError::ServerFailed(e.to_string()))?;

        tracing::info!("WebSocket server stopped");
        Ok(())
    }
}

/// Build the subscriber router over a broadcast hub.
///
/// Exposed separately so integration tests can serve it on an
/// OS-assigned port.
#[must_use]
pub fn router(hub: Arc<BroadcastHub>) -> Router {
    Router::new()
        .route(LIVE_PRICES_PATH, get(live_prices_handler))
        .with_state(hub)
}

// =============================================================================
// Handlers
// =============================================================================

async fn live_prices_handler(
    ws: WebSocketUpgrade,
    State(hub): State<Arc<BroadcastHub>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, hub))
}

/// Pump broadcast frames into one subscriber's socket.
async fn handle_socket(mut socket: WebSocket, hub: Arc<BroadcastHub>) {
    let (id, mut frames) = hub.attach();
    tracing::debug!(subscriber = %id, "subscriber attached");

    loop {
        tokio::select! {
            frame = frames.recv() => {
                match frame {
                    Some(frame) => {
                        if socket
                            .send(Message::Text(frame.to_string().into()))
                            .await
                            .is_err()
                        {
                            break;
                        }
                    }
                    None => break,
                }
            }
            inbound = socket.recv() => {
                match inbound {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {
                        // Push-only endpoint; inbound payloads ignored
                    }
                }
            }
        }
    }

    hub.detach(id);
    tracing::debug!(subscriber = %id, "subscriber detached");
}
