//! Relay service
//!
//! Wires a [`SourceLink`] into a [`StreamHub`] and exposes the relay's
//! administrative status.

use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;

use super::config::RelayConfig;
use super::link::{LinkMonitor, LinkState, SourceLink, UpstreamState};
use super::source::EventSource;
use crate::error::Result;
use crate::history::BufferStats;
use crate::hub::StreamHub;
use crate::sse::HttpEventSource;
use crate::stats::{LinkStats, ListenerStats};

/// Relay status document
#[derive(Debug, Clone, Serialize)]
pub struct RelayStatus {
    pub relay_id: String,
    pub source_url: String,
    pub is_connected: bool,
    pub link_state: LinkState,
    /// Number of attached listeners
    pub listeners: usize,
    pub listener_stats: Vec<ListenerStats>,
    pub buffer_stats: BufferStats,
    /// Latest upstream sequence info; `null` before the first chunk
    pub current_state: Option<UpstreamState>,
    pub link_stats: LinkStats,
}

/// A buffering relay: one upstream, many delayed listeners
pub struct Relay<S: EventSource = HttpEventSource> {
    config: RelayConfig,
    hub: Arc<StreamHub>,
    link: Arc<SourceLink<S>>,
}

impl Relay<HttpEventSource> {
    /// Create a relay reading SSE from `config.source_url`
    pub fn new(config: RelayConfig) -> Result<Self> {
        let source = HttpEventSource::new(&config.source_url)?;
        Ok(Self::with_source(config, source))
    }
}

impl<S: EventSource> Relay<S> {
    /// Create a relay over any event source
    pub fn with_source(config: RelayConfig, source: S) -> Self {
        let hub = Arc::new(StreamHub::with_config(config.hub.clone()));
        let link = Arc::new(SourceLink::new(source, Arc::clone(&hub), config.reconnect_backoff));
        Self { config, hub, link }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Hub holding the relay's history and listeners
    pub fn hub(&self) -> &Arc<StreamHub> {
        &self.hub
    }

    pub fn link_monitor(&self) -> &Arc<LinkMonitor> {
        self.link.monitor()
    }

    /// Snapshot the relay status
    pub async fn status(&self) -> RelayStatus {
        let monitor = self.link.monitor();
        let listener_stats = self.hub.listeners().stats().await;

        RelayStatus {
            relay_id: self.config.relay_id.clone(),
            source_url: self.config.source_url.clone(),
            is_connected: monitor.is_connected(),
            link_state: monitor.state(),
            listeners: listener_stats.len(),
            listener_stats,
            buffer_stats: self.hub.buffer_stats(),
            current_state: monitor.upstream(),
            link_stats: monitor.stats(),
        }
    }

    /// Run the source link and the delivery cycle until `shutdown` resolves
    ///
    /// Both loops observe the shutdown and finish their current step.
    pub async fn run_until<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let (stop_tx, stop_rx) = watch::channel(false);
        let stopped = |mut rx: watch::Receiver<bool>| async move {
            let _ = rx.wait_for(|stop| *stop).await;
        };

        tracing::info!(
            relay_id = %self.config.relay_id,
            source = %self.config.source_url,
            "Relay starting"
        );

        let trigger = async {
            shutdown.await;
            let _ = stop_tx.send(true);
        };

        tokio::join!(
            trigger,
            self.hub.run_playback_until(stopped(stop_rx.clone())),
            self.link.run_until(stopped(stop_rx)),
        );

        tracing::info!(relay_id = %self.config.relay_id, "Relay stopped");
    }

    /// Spawn the source link and the delivery cycle as background tasks
    pub fn spawn(&self) -> RelayTasks {
        RelayTasks {
            link: self.link.spawn(),
            playback: self.hub.spawn_playback_task(),
        }
    }
}

/// Handles to a relay's background tasks
#[derive(Debug)]
pub struct RelayTasks {
    pub link: tokio::task::JoinHandle<()>,
    pub playback: tokio::task::JoinHandle<()>,
}

impl RelayTasks {
    /// Abort both tasks
    pub fn abort(&self) {
        self.link.abort();
        self.playback.abort();
    }
}
