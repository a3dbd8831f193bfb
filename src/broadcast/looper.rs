//! Loop broadcaster state machine
//!
//! Cycles through a pre-chunked asset forever, one chunk per tick, whether
//! or not anyone is listening. Every wrap to position 0 starts a new
//! interval with a fresh id.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::Serialize;
use tokio::time::{Instant, MissedTickBehavior};
use uuid::Uuid;

use super::config::BroadcasterConfig;
use crate::hub::StreamHub;
use crate::media::{unix_millis, AudioAsset, AudioFormat, AudioFormatInfo, Chunk, SequenceInfo};

/// Mutable loop position
#[derive(Debug, Clone, Default)]
struct LoopState {
    position: u32,
    loop_count: u64,
    interval_id: Option<Arc<str>>,
    loop_started_at: Option<Instant>,
}

/// Status document describing where the loop is
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoopStatus {
    pub interval_id: Option<String>,
    pub loop_count: u64,
    /// Position of the next chunk to be emitted
    pub current_position: u32,
    pub total_chunks: u32,
    /// Milliseconds since the current interval started
    pub elapsed_ms: u64,
    pub total_duration_ms: u64,
    pub chunk_duration_ms: u64,
    pub audio_format: AudioFormatInfo,
}

/// Read-only view of a running broadcaster
#[derive(Debug, Clone)]
pub struct LoopMonitor {
    state: Arc<RwLock<LoopState>>,
    total_chunks: u32,
    chunk_duration: Duration,
    format: AudioFormat,
}

impl LoopMonitor {
    /// Snapshot the loop status
    pub fn status(&self) -> LoopStatus {
        let state = self.state.read().clone();
        LoopStatus {
            interval_id: state.interval_id.as_deref().map(str::to_string),
            loop_count: state.loop_count,
            current_position: state.position,
            total_chunks: self.total_chunks,
            elapsed_ms: state
                .loop_started_at
                .map(|t| t.elapsed().as_millis() as u64)
                .unwrap_or(0),
            total_duration_ms: (self.chunk_duration * self.total_chunks).as_millis() as u64,
            chunk_duration_ms: self.chunk_duration.as_millis() as u64,
            audio_format: self.format.info(),
        }
    }
}

/// Plays an asset on an endless loop into a [`StreamHub`]
pub struct LoopBroadcaster {
    asset: Arc<AudioAsset>,
    hub: Arc<StreamHub>,
    state: Arc<RwLock<LoopState>>,
    config: BroadcasterConfig,
}

impl LoopBroadcaster {
    /// Create a broadcaster positioned before its first tick
    pub fn new(asset: AudioAsset, hub: Arc<StreamHub>, config: BroadcasterConfig) -> Self {
        Self {
            asset: Arc::new(asset),
            hub,
            state: Arc::new(RwLock::new(LoopState::default())),
            config,
        }
    }

    /// Hub this broadcaster publishes into
    pub fn hub(&self) -> &Arc<StreamHub> {
        &self.hub
    }

    /// Read-only status handle
    pub fn monitor(&self) -> LoopMonitor {
        LoopMonitor {
            state: Arc::clone(&self.state),
            total_chunks: self.asset.total_chunks(),
            chunk_duration: self.asset.chunk_duration(),
            format: self.asset.format(),
        }
    }

    /// Advance the loop by one chunk
    pub fn next_chunk(&self) -> Chunk {
        let total_chunks = self.asset.total_chunks();
        let mut state = self.state.write();

        if state.position == 0 {
            let interval_id: Arc<str> = Arc::from(Uuid::new_v4().to_string());
            state.interval_id = Some(Arc::clone(&interval_id));
            state.loop_started_at = Some(Instant::now());
            state.loop_count += 1;

            tracing::info!(
                loop_count = state.loop_count,
                interval = %interval_id,
                "Starting loop"
            );
        }

        let position = state.position;
        let sequence = SequenceInfo {
            interval_id: state.interval_id.clone().unwrap_or_else(|| Arc::from("")),
            loop_count: state.loop_count,
            position,
            total_chunks,
        };
        state.position = (position + 1) % total_chunks;

        Chunk::new(
            self.asset.chunk_wrapping(position).clone(),
            self.asset.format(),
            sequence,
            unix_millis(),
        )
    }

    /// Emit one chunk to the hub
    ///
    /// Returns the number of real-time listeners it reached.
    pub async fn tick(&self) -> usize {
        let chunk = self.next_chunk();
        self.hub.publish(chunk).await
    }

    /// Run the loop until `shutdown` resolves
    ///
    /// Ticks are paced from a monotonic ticker so scheduling jitter never
    /// accumulates; a late tick is skipped rather than bursted.
    pub async fn run_until<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        if !self.config.warmup.is_zero() {
            tokio::select! {
                _ = &mut shutdown => return,
                _ = tokio::time::sleep(self.config.warmup) => {}
            }
        }

        let mut ticker = tokio::time::interval(self.asset.chunk_duration());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(
            chunks = self.asset.total_chunks(),
            chunk_ms = self.asset.chunk_duration().as_millis() as u64,
            "Loop broadcaster running"
        );

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    self.tick().await;
                }
            }
        }

        tracing::info!("Loop broadcaster stopped");
    }

    /// Spawn the loop as a background task
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run_until(std::future::pending()).await;
        })
    }
}
