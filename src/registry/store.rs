//! Listener registry implementation
//!
//! Tracks attached listeners and fans delivery records out to them.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;

use super::config::RegistryConfig;
use super::error::RegistryError;
use super::listener::{Listener, ListenerId, Subscription};
use crate::stats::ListenerStats;

/// Registry of attached listeners
///
/// Thread-safe via `RwLock`. Delivery takes a snapshot of the listener set
/// and iterates it without holding the lock, so attach/detach never wait on
/// a delivery cycle and a listener removed mid-cycle simply discards.
pub struct ListenerRegistry {
    /// Map of listener id to listener
    listeners: RwLock<HashMap<ListenerId, Arc<Listener>>>,

    /// Next id to hand out
    next_id: AtomicU64,

    /// Configuration
    config: RegistryConfig,
}

impl ListenerRegistry {
    /// Create a new registry with default configuration
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a new registry with custom configuration
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            listeners: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(0),
            config,
        }
    }

    /// Hold the listener map exclusively, as attach and detach do
    #[cfg(test)]
    pub(crate) async fn hold_write_lock(&self) -> tokio::sync::RwLockWriteGuard<'_, HashMap<ListenerId, Arc<Listener>>> {
        self.listeners.write().await
    }

    /// Get the registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Attach a new listener
    ///
    /// The requested delay is clamped into the configured range.
    pub async fn attach(&self, requested_delay_ms: i64) -> Subscription {
        let delay_ms = self.config.clamp_delay(requested_delay_ms);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let listener = Arc::new(Listener::new(id, delay_ms, self.config.queue_capacity));
        let subscription = Subscription::new(&listener);

        let mut listeners = self.listeners.write().await;
        listeners.insert(id, listener);

        tracing::info!(
            listener = id,
            delay_ms = delay_ms,
            listeners = listeners.len(),
            "Listener attached"
        );

        subscription
    }

    /// Detach a listener, closing its queue
    ///
    /// Returns false if the listener was already gone.
    pub async fn detach(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write().await;

        match listeners.remove(&id) {
            Some(listener) => {
                listener.close();
                tracing::info!(
                    listener = id,
                    listeners = listeners.len(),
                    "Listener detached"
                );
                true
            }
            None => false,
        }
    }

    /// Change a listener's delay in place
    ///
    /// Returns the clamped delay now in effect.
    pub async fn set_delay(&self, id: ListenerId, requested_delay_ms: i64) -> Result<u32, RegistryError> {
        let listeners = self.listeners.read().await;
        let listener = listeners
            .get(&id)
            .ok_or(RegistryError::ListenerNotFound(id))?;

        let delay_ms = self.config.clamp_delay(requested_delay_ms);
        listener.set_delay_ms(delay_ms);

        tracing::info!(listener = id, delay_ms = delay_ms, "Listener delay updated");

        Ok(delay_ms)
    }

    /// Most recently attached listener still present
    pub async fn latest(&self) -> Option<ListenerId> {
        self.listeners.read().await.keys().max().copied()
    }

    /// Snapshot of the current listener set
    pub async fn snapshot(&self) -> Vec<Arc<Listener>> {
        self.listeners.read().await.values().cloned().collect()
    }

    /// Look up a listener
    pub async fn get(&self, id: ListenerId) -> Option<Arc<Listener>> {
        self.listeners.read().await.get(&id).cloned()
    }

    /// Number of attached listeners
    pub async fn len(&self) -> usize {
        self.listeners.read().await.len()
    }

    /// Whether no listener is attached
    pub async fn is_empty(&self) -> bool {
        self.listeners.read().await.is_empty()
    }

    /// Counter snapshots of every listener, ordered by id
    pub async fn stats(&self) -> Vec<ListenerStats> {
        let mut stats: Vec<ListenerStats> = self
            .listeners
            .read()
            .await
            .values()
            .map(|listener| listener.stats())
            .collect();
        stats.sort_by_key(|s| s.id);
        stats
    }
}

impl Default for ListenerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::history::buffer::tests::make_chunk;
    use crate::history::BufferStats;
    use crate::registry::queue::PushOutcome;
    use crate::registry::DeliveryRecord;

    fn record(position: u32) -> DeliveryRecord {
        DeliveryRecord::new(make_chunk(position), Arc::from("test"), 0, BufferStats::default())
    }

    #[tokio::test]
    async fn test_attach_assigns_increasing_ids() {
        let registry = ListenerRegistry::new();

        let a = registry.attach(0).await;
        let b = registry.attach(0).await;
        let c = registry.attach(0).await;

        assert!(a.id() < b.id() && b.id() < c.id());
        assert_eq!(registry.len().await, 3);
        assert_eq!(registry.latest().await, Some(c.id()));
    }

    #[tokio::test]
    async fn test_attach_clamps_delay() {
        let registry = ListenerRegistry::new();

        let high = registry.attach(60_000).await;
        let low = registry.attach(-10).await;

        assert_eq!(high.initial_delay_ms(), 15_000);
        assert_eq!(low.initial_delay_ms(), 0);
    }

    #[tokio::test]
    async fn test_set_delay() {
        let registry = ListenerRegistry::new();
        let sub = registry.attach(0).await;

        let applied = registry.set_delay(sub.id(), 3_500).await.unwrap();
        assert_eq!(applied, 3_500);

        let listener = registry.get(sub.id()).await.unwrap();
        assert_eq!(listener.delay_ms(), 3_500);
        assert!(!listener.is_realtime());

        // Clamped
        assert_eq!(registry.set_delay(sub.id(), 20_000).await.unwrap(), 15_000);
    }

    #[tokio::test]
    async fn test_set_delay_unknown_listener() {
        let registry = ListenerRegistry::new();

        let result = registry.set_delay(42, 1_000).await;
        assert_eq!(result, Err(RegistryError::ListenerNotFound(42)));
    }

    #[tokio::test]
    async fn test_detach_closes_queue() {
        let registry = ListenerRegistry::new();
        let sub = registry.attach(0).await;
        let listener = registry.get(sub.id()).await.unwrap();

        listener.deliver(record(1));
        assert!(registry.detach(sub.id()).await);

        // Queued records are discarded and the drainer sees the end
        assert!(sub.recv().await.is_none());

        // Delivery through a stale snapshot is silently discarded
        assert_eq!(listener.deliver(record(2)), PushOutcome::Closed);

        // Second detach is a no-op
        assert!(!registry.detach(sub.id()).await);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_ids_not_reused_after_detach() {
        let registry = ListenerRegistry::new();
        let first = registry.attach(0).await;
        registry.detach(first.id()).await;

        let second = registry.attach(0).await;
        assert_ne!(first.id(), second.id());
    }

    #[tokio::test]
    async fn test_stats_counts_drops() {
        let registry = ListenerRegistry::with_config(RegistryConfig::default().queue_capacity(2));
        let sub = registry.attach(0).await;
        let listener = registry.get(sub.id()).await.unwrap();

        for i in 0..5 {
            listener.deliver(record(i));
        }

        let stats = registry.stats().await;
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].enqueued, 5);
        assert_eq!(stats[0].dropped, 3);
        assert_eq!(stats[0].queued, 2);

        // Survivors are the two freshest, in order
        assert_eq!(sub.try_recv().unwrap().chunk.sequence.position, 3);
        assert_eq!(sub.try_recv().unwrap().chunk.sequence.position, 4);
    }
}
