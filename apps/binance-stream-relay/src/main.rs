//! Binance Stream Relay Binary
//!
//! Starts the live price relay.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin binance-stream-relay
//! ```
//!
//! # Environment Variables (all optional)
//!
//! - `STREAM_RELAY_UPSTREAM_URL`: Upstream WebSocket base URL
//!   (default: wss://stream.binance.com:9443)
//! - `STREAM_RELAY_QUOTE_ASSET`: Upstream quote asset (default: USDT)
//! - `STREAM_RELAY_RECONNECT_DELAY_MS`: Reconnect delay (default: 5000)
//! - `STREAM_RELAY_RATE_ENDPOINT`: Display-rate endpoint (default: CoinGecko)
//! - `STREAM_RELAY_RATE_REFRESH_SECS`: Rate refresh interval (default: 300)
//! - `STREAM_RELAY_FALLBACK_RATE`: Rate used before the first refresh (default: 83.0)
//! - `STREAM_RELAY_WS_PORT`: Subscriber WebSocket port (default: 8080)
//! - `STREAM_RELAY_HEALTH_PORT`: Health check HTTP port (default: 8082)
//! - `OTEL_ENABLED`: Enable OpenTelemetry (default: true)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (default: <http://localhost:4318>)
//! - `OTEL_SERVICE_NAME`: Service name (default: binance-stream-relay)
//! - `RUST_LOG`: Log level (default: info)

use std::sync::Arc;

use binance_stream_relay::infrastructure::telemetry;
use binance_stream_relay::{
    BroadcastConfig, BroadcastHub, CoinGeckoRates, FeedEvent, FeedState, HealthServer,
    HealthServerState, InstrumentRegistry, RateHandle, RateRefresher, RelayConfig, RelayService,
    TickerClient, TickerClientConfig, WsServer, init_metrics,
};
use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Capacity of the decoded-update channel between connector and pipeline.
const FEED_EVENT_BUFFER: usize = 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    #[allow(clippy::expect_used)]
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    load_dotenv();

    // Initialize telemetry (OpenTelemetry + tracing)
    let _telemetry_guard = telemetry::init();

    tracing::info!("Starting Binance Stream Relay");

    // Initialize Prometheus metrics
    let _metrics_handle = init_metrics();

    let config = RelayConfig::from_env()?;
    log_config(&config);

    let shutdown_token = CancellationToken::new();

    // The fixed instrument set, defined once at startup
    let registry = Arc::new(InstrumentRegistry::with_majors(
        config.feed.quote_asset.clone(),
    ));
    tracing::info!(instruments = registry.len(), "Instrument registry loaded");

    // Broadcast hub for snapshot distribution
    let hub = Arc::new(BroadcastHub::new(BroadcastConfig::from(
        config.broadcast.clone(),
    )));

    // Upstream feed status shared with health reporting
    let feed_state = Arc::new(FeedState::new());

    // Display-rate provider and refresher
    let rates = RateHandle::new(config.rates.fallback_rate);
    let rate_provider = Arc::new(CoinGeckoRates::new(
        config.rates.endpoint.clone(),
        config.rates.request_timeout,
    )?);
    let refresher = RateRefresher::new(
        rate_provider,
        rates.clone(),
        config.rates.refresh_interval,
        shutdown_token.clone(),
    );
    tokio::spawn(refresher.run());

    // The relay pipeline: single consumer of decoded updates
    let (event_tx, event_rx) = mpsc::channel::<FeedEvent>(FEED_EVENT_BUFFER);
    let relay = RelayService::new(
        Arc::clone(&registry),
        rates,
        Arc::clone(&hub),
        Arc::clone(&feed_state),
    );
    tokio::spawn(relay.run(event_rx));

    // Upstream ticker client
    let ticker_config = TickerClientConfig::for_registry(&config.feed, &registry);
    let ticker_client = Arc::new(TickerClient::new(
        ticker_config,
        event_tx,
        shutdown_token.clone(),
    ));
    tokio::spawn(async move {
        if let Err(e) = ticker_client.run().await {
            tracing::error!(error = %e, "Ticker client error");
        }
    });

    // Health server
    let health_state = Arc::new(HealthServerState::new(
        env!("CARGO_PKG_VERSION").to_string(),
        Arc::clone(&feed_state),
        Arc::clone(&hub),
    ));
    let health_server = HealthServer::new(
        config.server.health_port,
        health_state,
        shutdown_token.clone(),
    );
    tokio::spawn(async move {
        if let Err(e) = health_server.run().await {
            tracing::error!(error = %e, "Health server error");
        }
    });

    // Subscriber WebSocket server
    let ws_server = WsServer::new(
        config.server.ws_port,
        Arc::clone(&hub),
        shutdown_token.clone(),
    );
    tokio::spawn(async move {
        if let Err(e) = ws_server.run().await {
            tracing::error!(error = %e, "WebSocket server error");
        }
    });

    tracing::info!("Stream relay ready");

    await_shutdown(shutdown_token).await;

    tracing::info!("Stream relay stopped");
    Ok(())
}

/// Load .env file from current or ancestor directories.
fn load_dotenv() {
    if dotenvy::dotenv().is_err() {
        load_dotenv_from_ancestors();
    }
}

/// Log the parsed configuration.
fn log_config(config: &RelayConfig) {
    tracing::info!(
        upstream_url = %config.feed.upstream_url,
        quote_asset = %config.feed.quote_asset,
        reconnect_delay_ms = config.feed.reconnect_delay.as_millis(),
        rate_refresh_secs = config.rates.refresh_interval.as_secs(),
        ws_port = config.server.ws_port,
        health_port = config.server.health_port,
        "Configuration loaded"
    );
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv_from_ancestors() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }

    shutdown_token.cancel();

    tracing::info!("Graceful shutdown started");
}
