//! Buffering relay with per-listener delay
//!
//! Run with: cargo run --example relay_server
//!
//! Environment:
//!   AUDIO_SOURCE_URL   upstream producer (default: http://audio-source:8000)
//!   BIND_ADDR          address to listen on (default: 0.0.0.0:8001)
//!   RELAY_ID           identity stamped on records (default: relay-buffered)
//!   RUST_LOG           log filter (default: info)
//!
//! Endpoints:
//!   GET  /stream?delay=ms   SSE stream of delivery records (default delay 2000ms)
//!   POST /set-delay         {"delay_ms": n, "listener_id"?: id}
//!   GET  /status            link state, buffer occupancy, listeners
//!
//! Try it:
//!   curl -N 'http://localhost:8001/stream?delay=5000'
//!   curl -X POST -d '{"delay_ms": 1000}' http://localhost:8001/set-delay

use std::net::SocketAddr;
use std::sync::Arc;

use audio_relay::relay::{Relay, RelayConfig};
use audio_relay::server::{HttpServer, RelayService, ServerConfig, DEFAULT_RELAY_PORT};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let mut config = RelayConfig::default();
    if let Ok(url) = std::env::var("AUDIO_SOURCE_URL") {
        config = config.source_url(url);
    }
    if let Ok(id) = std::env::var("RELAY_ID") {
        config = config.relay_id(id);
    }
    let bind_addr: SocketAddr = match std::env::var("BIND_ADDR") {
        Ok(addr) => addr.parse()?,
        Err(_) => SocketAddr::from(([0, 0, 0, 0], DEFAULT_RELAY_PORT)),
    };

    let relay = Arc::new(Relay::new(config)?);
    let server = HttpServer::new(ServerConfig::with_addr(bind_addr), RelayService::new(Arc::clone(&relay)));

    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let relay_task = {
        let relay = Arc::clone(&relay);
        tokio::spawn(async move {
            relay
                .run_until(async {
                    let _ = stop_rx.await;
                })
                .await;
        })
    };

    let result = server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await;

    let _ = stop_tx.send(());
    let _ = relay_task.await;

    result?;
    Ok(())
}
