//! Per-listener state
//!
//! The delay lives in an atomic so it can change while the delivery cycle
//! holds a snapshot of the listener set.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use super::queue::{DeliveryQueue, PushOutcome};
use super::record::DeliveryRecord;
use crate::stats::ListenerStats;

/// Unique listener identifier, assigned in attach order
pub type ListenerId = u64;

/// An attached listener
#[derive(Debug)]
pub struct Listener {
    id: ListenerId,
    delay_ms: AtomicU32,
    queue: Arc<DeliveryQueue<DeliveryRecord>>,
    attached_at: Instant,
    enqueued: AtomicU64,
    dropped: AtomicU64,
}

impl Listener {
    pub(super) fn new(id: ListenerId, delay_ms: u32, queue_capacity: usize) -> Self {
        Self {
            id,
            delay_ms: AtomicU32::new(delay_ms),
            queue: Arc::new(DeliveryQueue::new(queue_capacity)),
            attached_at: Instant::now(),
            enqueued: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Listener id
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Currently requested delay in milliseconds
    pub fn delay_ms(&self) -> u32 {
        self.delay_ms.load(Ordering::Relaxed)
    }

    /// Currently requested delay
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms() as u64)
    }

    /// Whether this listener is served on the immediate path
    pub fn is_realtime(&self) -> bool {
        self.delay_ms() == 0
    }

    pub(super) fn set_delay_ms(&self, delay_ms: u32) {
        self.delay_ms.store(delay_ms, Ordering::Relaxed);
    }

    /// Enqueue a record for this listener
    ///
    /// Never blocks. Records for a detached listener are discarded.
    pub fn deliver(&self, record: DeliveryRecord) -> PushOutcome {
        let outcome = self.queue.push(record);
        match outcome {
            PushOutcome::Queued => {
                self.enqueued.fetch_add(1, Ordering::Relaxed);
            }
            PushOutcome::ReplacedOldest => {
                self.enqueued.fetch_add(1, Ordering::Relaxed);
                self.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(listener = self.id, "Listener queue full, dropped oldest record");
            }
            PushOutcome::Closed => {}
        }
        outcome
    }

    pub(super) fn close(&self) {
        self.queue.close();
    }

    pub(super) fn queue(&self) -> Arc<DeliveryQueue<DeliveryRecord>> {
        Arc::clone(&self.queue)
    }

    /// Counter snapshot
    pub fn stats(&self) -> ListenerStats {
        ListenerStats {
            id: self.id,
            delay_ms: self.delay_ms(),
            queued: self.queue.len(),
            enqueued: self.enqueued.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            connected_secs: self.attached_at.elapsed().as_secs_f64(),
        }
    }
}

/// Receiving side of an attachment, held by the transport
///
/// Dropping a subscription does not detach it; the owner calls
/// [`ListenerRegistry::detach`](super::ListenerRegistry::detach) when its
/// client goes away.
#[derive(Debug)]
pub struct Subscription {
    id: ListenerId,
    delay_ms: u32,
    queue: Arc<DeliveryQueue<DeliveryRecord>>,
}

impl Subscription {
    pub(super) fn new(listener: &Listener) -> Self {
        Self {
            id: listener.id,
            delay_ms: listener.delay_ms(),
            queue: listener.queue(),
        }
    }

    /// Listener id
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Delay in effect at attach time (after clamping)
    pub fn initial_delay_ms(&self) -> u32 {
        self.delay_ms
    }

    /// Wait for the next record; `None` once detached
    pub async fn recv(&self) -> Option<DeliveryRecord> {
        self.queue.recv().await
    }

    /// Take a queued record without waiting
    pub fn try_recv(&self) -> Option<DeliveryRecord> {
        self.queue.try_pop()
    }
}
