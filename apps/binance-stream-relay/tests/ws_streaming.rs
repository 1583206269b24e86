//! WebSocket Streaming Integration Tests
//!
//! Serves the subscriber router on an OS-assigned port and exercises
//! the attach/push/detach lifecycle with real WebSocket clients.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;

use binance_stream_relay::{BroadcastHub, LIVE_PRICES_PATH, SnapshotFrame, ws_router};

async fn serve_router() -> (Arc<BroadcastHub>, SocketAddr) {
    let hub = Arc::new(BroadcastHub::with_defaults());
    let app = ws_router(Arc::clone(&hub));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (hub, addr)
}

async fn connect(
    addr: SocketAddr,
) -> tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
> {
    let url = format!("ws://{addr}{LIVE_PRICES_PATH}");
    let (stream, _response) = tokio_tungstenite::connect_async(url).await.unwrap();
    stream
}

/// Wait until the hub reports the expected subscriber count.
async fn await_subscribers(hub: &BroadcastHub, expected: usize) {
    for _ in 0..100 {
        if hub.subscriber_count() == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "subscriber count never reached {expected}, still {}",
        hub.subscriber_count()
    );
}

fn frame(text: &str) -> SnapshotFrame {
    Arc::from(text)
}

// =============================================================================
// Delivery
// =============================================================================

#[tokio::test]
async fn subscriber_receives_broadcast_frames() {
    let (hub, addr) = serve_router().await;
    let mut client = connect(addr).await;
    await_subscribers(&hub, 1).await;

    let delivered = hub.broadcast(frame(r#"[{"id":"BTCUSDT"}]"#));
    assert_eq!(delivered, 1);

    let msg = timeout(Duration::from_secs(2), client.next())
        .await
        .expect("timeout")
        .expect("stream ended")
        .expect("ws error");
    assert_eq!(msg.into_text().unwrap().as_str(), r#"[{"id":"BTCUSDT"}]"#);
}

#[tokio::test]
async fn all_connected_subscribers_receive_the_same_frame() {
    let (hub, addr) = serve_router().await;
    let mut client1 = connect(addr).await;
    let mut client2 = connect(addr).await;
    await_subscribers(&hub, 2).await;

    let delivered = hub.broadcast(frame("snapshot"));
    assert_eq!(delivered, 2);

    for client in [&mut client1, &mut client2] {
        let msg = timeout(Duration::from_secs(2), client.next())
            .await
            .expect("timeout")
            .expect("stream ended")
            .expect("ws error");
        assert_eq!(msg.into_text().unwrap().as_str(), "snapshot");
    }
}

#[tokio::test]
async fn new_subscriber_gets_no_backlog() {
    let (hub, addr) = serve_router().await;

    // Broadcast before anyone is attached.
    assert_eq!(hub.broadcast(frame("before")), 0);

    let mut client = connect(addr).await;
    await_subscribers(&hub, 1).await;

    let _ = hub.broadcast(frame("after"));

    // The first frame the subscriber sees is the one sent after attach.
    let msg = timeout(Duration::from_secs(2), client.next())
        .await
        .expect("timeout")
        .expect("stream ended")
        .expect("ws error");
    assert_eq!(msg.into_text().unwrap().as_str(), "after");
}

// =============================================================================
// Detach
// =============================================================================

#[tokio::test]
async fn client_close_detaches_subscriber() {
    let (hub, addr) = serve_router().await;
    let mut client = connect(addr).await;
    await_subscribers(&hub, 1).await;

    client.send(Message::Close(None)).await.unwrap();
    drop(client);

    await_subscribers(&hub, 0).await;
}

#[tokio::test]
async fn dropped_connection_is_cleaned_up() {
    let (hub, addr) = serve_router().await;
    let client = connect(addr).await;
    await_subscribers(&hub, 1).await;

    // Abrupt drop without a close handshake.
    drop(client);

    await_subscribers(&hub, 0).await;
}

#[tokio::test]
async fn subscribers_can_reconnect() {
    let (hub, addr) = serve_router().await;

    {
        let mut client = connect(addr).await;
        await_subscribers(&hub, 1).await;

        let _ = hub.broadcast(frame("one"));
        let msg = timeout(Duration::from_secs(2), client.next())
            .await
            .expect("timeout")
            .expect("stream ended")
            .expect("ws error");
        assert_eq!(msg.into_text().unwrap().as_str(), "one");
    }

    await_subscribers(&hub, 0).await;

    let mut client = connect(addr).await;
    await_subscribers(&hub, 1).await;

    let _ = hub.broadcast(frame("two"));
    let msg = timeout(Duration::from_secs(2), client.next())
        .await
        .expect("timeout")
        .expect("stream ended")
        .expect("ws error");
    assert_eq!(msg.into_text().unwrap().as_str(), "two");
}
