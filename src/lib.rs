//! Looping audio broadcaster and variable-latency relay
//!
//! Two cooperating services:
//!
//! - A **producer** loads an audio asset, splits it into fixed-duration
//!   chunks and broadcasts them on an endless loop in real time.
//! - A **relay** subscribes to a producer, keeps a rolling history of recent
//!   chunks and serves each listener with its own adjustable delay.
//!
//! ```text
//!  AudioAsset ─► LoopBroadcaster ─► StreamHub ──SSE──► SourceLink ─► StreamHub ──SSE──► listeners
//!                                  (producer)                       (relay, delayed)
//! ```
//!
//! # Producer
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use audio_relay::broadcast::{BroadcasterConfig, LoopBroadcaster};
//! use audio_relay::hub::{HubConfig, StreamHub};
//! use audio_relay::media::AudioAsset;
//! use audio_relay::server::{HttpServer, ProducerService, ServerConfig};
//!
//! # async fn example() -> audio_relay::error::Result<()> {
//! let asset = AudioAsset::load("loop.wav", Duration::from_millis(100)).await?;
//! let hub = Arc::new(StreamHub::with_config(HubConfig::producer("audio-source")));
//! let broadcaster = LoopBroadcaster::new(asset, Arc::clone(&hub), BroadcasterConfig::default());
//! let service = ProducerService::new(hub, broadcaster.monitor());
//!
//! broadcaster.spawn();
//! HttpServer::new(ServerConfig::default(), service).run().await
//! # }
//! ```
//!
//! # Relay
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use audio_relay::relay::{Relay, RelayConfig};
//! use audio_relay::server::{HttpServer, RelayService, ServerConfig};
//!
//! # async fn example() -> audio_relay::error::Result<()> {
//! let relay = Arc::new(Relay::new(RelayConfig::default().source_url("http://127.0.0.1:8000"))?);
//! let _tasks = relay.spawn();
//!
//! let config = ServerConfig::with_addr("0.0.0.0:8001".parse().unwrap());
//! HttpServer::new(config, RelayService::new(relay)).run().await
//! # }
//! ```

pub mod broadcast;
pub mod error;
pub mod history;
pub mod hub;
pub mod media;
pub mod registry;
pub mod relay;
pub mod server;
pub mod sse;
pub mod stats;
pub mod wire;

pub use broadcast::{BroadcasterConfig, LoopBroadcaster};
pub use error::{Error, Result};
pub use history::{resolve, HistoryBuffer};
pub use hub::{HubConfig, StreamHub};
pub use media::{AudioAsset, Chunk};
pub use registry::{ListenerRegistry, Subscription};
pub use relay::{Relay, RelayConfig, SourceLink};
pub use server::{HttpServer, ServerConfig};
