//! Looping audio producer
//!
//! Run with: cargo run --example loop_server
//!
//! Environment:
//!   AUDIO_FILE   PCM WAVE file to loop (default: loop.wav)
//!   BIND_ADDR    address to listen on (default: 0.0.0.0:8000)
//!   RUST_LOG     log filter (default: info)
//!
//! Endpoints:
//!   GET /stream   SSE stream: one status event, then a chunk event every 100ms
//!   GET /status   loop position and listener count

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use audio_relay::broadcast::{BroadcasterConfig, LoopBroadcaster};
use audio_relay::hub::{HubConfig, StreamHub};
use audio_relay::media::AudioAsset;
use audio_relay::server::{HttpServer, ProducerService, ServerConfig, DEFAULT_PRODUCER_PORT};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let audio_file = std::env::var("AUDIO_FILE").unwrap_or_else(|_| "loop.wav".to_string());
    let bind_addr: SocketAddr = match std::env::var("BIND_ADDR") {
        Ok(addr) => addr.parse()?,
        Err(_) => SocketAddr::from(([0, 0, 0, 0], DEFAULT_PRODUCER_PORT)),
    };

    let broadcaster_config = BroadcasterConfig::default();

    // Nothing to serve without audio
    let asset = match AudioAsset::load(&audio_file, broadcaster_config.chunk_duration).await {
        Ok(asset) => asset,
        Err(e) => {
            tracing::error!(path = %audio_file, error = %e, "Failed to load audio asset");
            std::process::exit(1);
        }
    };

    let hub = Arc::new(StreamHub::with_config(
        HubConfig::producer("audio-source").chunk_duration(asset.chunk_duration()),
    ));
    let broadcaster = LoopBroadcaster::new(asset, Arc::clone(&hub), broadcaster_config);
    let service = ProducerService::new(hub, broadcaster.monitor());
    let server = HttpServer::new(ServerConfig::with_addr(bind_addr), service);

    let broadcast_task = broadcaster.spawn();

    let result = server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await;

    broadcast_task.abort();
    // Let in-flight streams observe the closed sockets
    tokio::time::sleep(Duration::from_millis(50)).await;

    result?;
    Ok(())
}
