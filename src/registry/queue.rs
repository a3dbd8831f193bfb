//! Bounded drop-oldest delivery queue
//!
//! One writer (the fan-out) pushes without ever blocking; one drainer (the
//! listener's transport task) awaits records. When the queue is full the
//! oldest record is evicted to make room, so a stalled drainer only loses
//! freshness and never holds up the producer.

use std::collections::VecDeque;

use parking_lot::Mutex;
use tokio::sync::Notify;

/// Outcome of a push
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Record queued with room to spare
    Queued,
    /// Queue was full; the oldest record was evicted first
    ReplacedOldest,
    /// Queue is closed; the record was discarded
    Closed,
}

struct QueueState<T> {
    items: VecDeque<T>,
    closed: bool,
}

/// Single-producer single-consumer queue with drop-oldest backpressure
pub struct DeliveryQueue<T> {
    capacity: usize,
    state: Mutex<QueueState<T>>,
    notify: Notify,
}

impl<T> DeliveryQueue<T> {
    /// Create a queue holding at most `capacity` records
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            state: Mutex::new(QueueState {
                items: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            notify: Notify::new(),
        }
    }

    /// Enqueue a record, evicting the oldest one if the queue is full
    pub fn push(&self, item: T) -> PushOutcome {
        let outcome = {
            let mut state = self.state.lock();
            if state.closed {
                return PushOutcome::Closed;
            }

            let outcome = if state.items.len() >= self.capacity {
                state.items.pop_front();
                PushOutcome::ReplacedOldest
            } else {
                PushOutcome::Queued
            };
            state.items.push_back(item);
            outcome
        };

        self.notify.notify_one();
        outcome
    }

    /// Take the oldest record without waiting
    pub fn try_pop(&self) -> Option<T> {
        self.state.lock().items.pop_front()
    }

    /// Wait for the next record
    ///
    /// Returns `None` once the queue has been closed. Records still queued
    /// at close time are discarded.
    pub async fn recv(&self) -> Option<T> {
        loop {
            {
                let mut state = self.state.lock();
                if state.closed {
                    return None;
                }
                if let Some(item) = state.items.pop_front() {
                    return Some(item);
                }
            }
            // notify_one stores a permit when nobody is waiting, so a push
            // between the check above and this await is not lost
            self.notify.notified().await;
        }
    }

    /// Close the queue, discarding queued records and waking the drainer
    pub fn close(&self) {
        {
            let mut state = self.state.lock();
            state.closed = true;
            state.items.clear();
        }
        self.notify.notify_one();
    }

    /// Whether the queue has been closed
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Number of queued records
    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    /// Whether no records are queued
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of queued records
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<T> std::fmt::Debug for DeliveryQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryQueue")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}
