//! Upstream Reconnection Integration Tests
//!
//! Runs the ticker client against a local mock exchange server and
//! observes the recovery contract: after the upstream ends a session,
//! exactly one new connect attempt is made, and no sooner than the
//! configured delay.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::SinkExt;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::{Instant, timeout};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;

use binance_stream_relay::{
    FeedEvent, FeedSettings, Instrument, InstrumentRegistry, TickerClient, TickerClientConfig,
};

const TICKER_FRAME: &str = r#"{"stream":"btcusdt@ticker","data":{"e":"24hrTicker","s":"BTCUSDT","c":"100.0","P":"1.0","h":"105.0","l":"95.0","v":"10.0"}}"#;

/// Mock upstream: accepts each connection, pushes one ticker frame,
/// then closes the session. Reports accept times on a channel.
async fn spawn_mock_upstream() -> (SocketAddr, mpsc::UnboundedReceiver<Instant>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (accepts_tx, accepts_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((stream, _peer)) = listener.accept().await {
            let _ = accepts_tx.send(Instant::now());
            let mut ws = accept_async(stream).await.unwrap();
            ws.send(Message::Text(TICKER_FRAME.into())).await.unwrap();
            let _ = ws.close(None).await;
        }
    });

    (addr, accepts_rx)
}

fn feed_settings(addr: SocketAddr, delay: Duration) -> FeedSettings {
    FeedSettings {
        upstream_url: format!("ws://{addr}"),
        quote_asset: "USDT".to_string(),
        reconnect_delay: delay,
        max_reconnect_attempts: 0,
    }
}

#[tokio::test]
async fn reconnects_no_sooner_than_the_configured_delay() {
    let (addr, mut accepts) = spawn_mock_upstream().await;

    let delay = Duration::from_millis(300);
    let registry = InstrumentRegistry::new("USDT", vec![Instrument::major("BTC")]);
    let config = TickerClientConfig::for_registry(&feed_settings(addr, delay), &registry);

    let cancel = CancellationToken::new();
    let (event_tx, mut events) = mpsc::channel(64);
    let client = Arc::new(TickerClient::new(config, event_tx, cancel.clone()));
    tokio::spawn(client.run());

    let first = timeout(Duration::from_secs(2), accepts.recv())
        .await
        .expect("first connect never happened")
        .unwrap();
    let second = timeout(Duration::from_secs(2), accepts.recv())
        .await
        .expect("no reconnect attempt observed")
        .unwrap();

    // The recovery waits the full configured delay before dialing again.
    assert!(
        second - first >= delay,
        "reconnect fired after {:?}, before the {delay:?} floor",
        second - first
    );

    // Exactly one connect attempt per disconnect: no third session until
    // the next delay has elapsed.
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(accepts.try_recv().is_err());

    cancel.cancel();

    // The session produced decoded updates before the disconnect.
    let mut saw_ticker = false;
    let mut saw_disconnect = false;
    let mut saw_reconnecting = false;
    while let Ok(Some(event)) = timeout(Duration::from_millis(500), events.recv()).await {
        match event {
            FeedEvent::Ticker(update) => {
                assert_eq!(update.upstream_symbol, "BTCUSDT");
                saw_ticker = true;
            }
            FeedEvent::Disconnected => saw_disconnect = true,
            FeedEvent::Reconnecting { attempt } => {
                assert_eq!(attempt, 1);
                saw_reconnecting = true;
            }
            _ => {}
        }
    }

    assert!(saw_ticker, "no decoded update was emitted");
    assert!(saw_disconnect, "session end was not reported");
    assert!(saw_reconnecting, "recovery was not reported");
}

#[tokio::test]
async fn updates_resume_after_reconnect() {
    let (addr, mut accepts) = spawn_mock_upstream().await;

    let registry = InstrumentRegistry::new("USDT", vec![Instrument::major("BTC")]);
    let config = TickerClientConfig::for_registry(
        &feed_settings(addr, Duration::from_millis(100)),
        &registry,
    );

    let cancel = CancellationToken::new();
    let (event_tx, mut events) = mpsc::channel(64);
    let client = Arc::new(TickerClient::new(config, event_tx, cancel.clone()));
    tokio::spawn(client.run());

    // Two sessions happen.
    let _ = timeout(Duration::from_secs(2), accepts.recv()).await.unwrap();
    let _ = timeout(Duration::from_secs(2), accepts.recv()).await.unwrap();

    // Each session delivers a decoded update: one before the disconnect,
    // one after the reconnect.
    let mut tickers = 0;
    while tickers < 2 {
        match timeout(Duration::from_secs(2), events.recv())
            .await
            .expect("updates did not resume after reconnect")
        {
            Some(FeedEvent::Ticker(_)) => tickers += 1,
            Some(_) => {}
            None => panic!("event channel closed early"),
        }
    }

    cancel.cancel();
}
