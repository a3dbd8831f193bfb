//! Stream hub implementation
//!
//! The hub owns one upstream's history and its listener registry. Exactly one
//! producing path calls [`StreamHub::publish`]; the playback task calls
//! [`StreamHub::deliver_delayed`] once per chunk duration.

use std::future::Future;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::time::{Instant, MissedTickBehavior};

use super::config::HubConfig;
use crate::history::{resolve, BufferStats, HistoryBuffer};
use crate::media::Chunk;
use crate::registry::{DeliveryRecord, ListenerId, ListenerRegistry, RegistryError, Subscription};

/// History buffer plus fan-out for one upstream
pub struct StreamHub {
    /// Identity stamped on delivery records
    id: Arc<str>,

    /// Retained chunks; write-locked only for the append
    history: RwLock<HistoryBuffer>,

    /// Most recently published chunk
    latest: RwLock<Option<Chunk>>,

    /// Attached listeners
    listeners: ListenerRegistry,

    /// Configuration
    config: HubConfig,
}

impl StreamHub {
    /// Create a hub with default configuration
    pub fn new() -> Self {
        Self::with_config(HubConfig::default())
    }

    /// Create a hub with custom configuration
    pub fn with_config(config: HubConfig) -> Self {
        Self {
            id: Arc::from(config.id.as_str()),
            history: RwLock::new(HistoryBuffer::new(config.history_capacity())),
            latest: RwLock::new(None),
            listeners: ListenerRegistry::with_config(config.registry.clone()),
            config,
        }
    }

    /// Hub identity
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get the hub configuration
    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Listener registry
    pub fn listeners(&self) -> &ListenerRegistry {
        &self.listeners
    }

    /// Attach a listener with the requested delay (clamped)
    pub async fn attach(&self, requested_delay_ms: i64) -> Subscription {
        self.listeners.attach(requested_delay_ms).await
    }

    /// Detach a listener
    pub async fn detach(&self, id: ListenerId) -> bool {
        self.listeners.detach(id).await
    }

    /// Change a listener's delay
    pub async fn set_delay(&self, id: ListenerId, requested_delay_ms: i64) -> Result<u32, RegistryError> {
        self.listeners.set_delay(id, requested_delay_ms).await
    }

    /// Record a new chunk and push it to real-time listeners
    ///
    /// Returns the number of real-time listeners it was delivered to.
    pub async fn publish(&self, chunk: Chunk) -> usize {
        self.publish_at(chunk, Instant::now()).await
    }

    /// Record a chunk received at `now` and push it to real-time listeners
    pub async fn publish_at(&self, chunk: Chunk, now: Instant) -> usize {
        let stats = {
            let mut history = self.history.write();
            history.append_at(chunk.clone(), now);
            history.stats_at(now)
        };
        *self.latest.write() = Some(chunk.clone());

        let mut delivered = 0;
        for listener in self.listeners.snapshot().await {
            if listener.is_realtime() {
                let record = DeliveryRecord::new(chunk.clone(), Arc::clone(&self.id), 0, stats);
                listener.deliver(record);
                delivered += 1;
            }
        }

        tracing::trace!(
            hub = %self.id,
            position = chunk.sequence.position,
            realtime_listeners = delivered,
            "Chunk published"
        );

        delivered
    }

    /// Run one periodic delivery cycle for delayed listeners
    ///
    /// Returns the number of listeners that received a record.
    pub async fn deliver_delayed(&self) -> usize {
        self.deliver_delayed_at(Instant::now()).await
    }

    /// Run one periodic delivery cycle as of `now`
    pub async fn deliver_delayed_at(&self, now: Instant) -> usize {
        let listeners = self.listeners.snapshot().await;

        let (stats, picks) = {
            let history = self.history.read();
            let stats = history.stats_at(now);
            let picks: Vec<_> = listeners
                .into_iter()
                .filter_map(|listener| {
                    let delay_ms = listener.delay_ms();
                    if delay_ms == 0 {
                        return None;
                    }
                    resolve(&history, listener.delay(), now)
                        .map(|entry| (listener, delay_ms, entry.chunk.clone()))
                })
                .collect();
            (stats, picks)
        };

        let delivered = picks.len();
        for (listener, delay_ms, chunk) in picks {
            listener.deliver(DeliveryRecord::new(chunk, Arc::clone(&self.id), delay_ms, stats));
        }

        delivered
    }

    /// Drive the periodic delivery cycle until `shutdown` resolves
    ///
    /// Cycles are paced from a monotonic ticker; a cycle in progress always
    /// completes before shutdown is observed.
    pub async fn run_playback_until<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(self.config.chunk_duration);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    self.deliver_delayed().await;
                }
            }
        }

        tracing::debug!(hub = %self.id, "Playback loop stopped");
    }

    /// Spawn the periodic delivery cycle as a background task
    ///
    /// Returns a handle that can be used to abort the task.
    pub fn spawn_playback_task(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let hub = Arc::clone(self);
        tokio::spawn(async move {
            hub.run_playback_until(std::future::pending()).await;
        })
    }

    /// Current buffer occupancy
    pub fn buffer_stats(&self) -> BufferStats {
        self.history.read().stats()
    }

    /// Number of retained chunks
    pub fn history_len(&self) -> usize {
        self.history.read().len()
    }

    /// Most recently published chunk
    pub fn latest_chunk(&self) -> Option<Chunk> {
        self.latest.read().clone()
    }
}

impl Default for StreamHub {
    fn default() -> Self {
        Self::new()
    }
}
