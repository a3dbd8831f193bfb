//! Statistics for listeners and the upstream link

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Per-listener delivery statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ListenerStats {
    /// Listener id
    pub id: u64,
    /// Delay currently in effect
    pub delay_ms: u32,
    /// Records waiting in the queue
    pub queued: usize,
    /// Records pushed into the queue
    pub enqueued: u64,
    /// Records evicted unread because the queue was full
    pub dropped: u64,
    /// Seconds since attach
    pub connected_secs: f64,
}

impl ListenerStats {
    /// Fraction of enqueued records that were dropped
    pub fn drop_ratio(&self) -> f64 {
        if self.enqueued > 0 {
            self.dropped as f64 / self.enqueued as f64
        } else {
            0.0
        }
    }
}

/// Upstream link counters
#[derive(Debug, Default)]
pub struct LinkCounters {
    events: AtomicU64,
    malformed: AtomicU64,
    connects: AtomicU64,
    disconnects: AtomicU64,
}

impl LinkCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_event(&self) {
        self.events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_malformed(&self) {
        self.malformed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_connect(&self) {
        self.connects.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy
    pub fn snapshot(&self) -> LinkStats {
        LinkStats {
            events: self.events.load(Ordering::Relaxed),
            malformed_events: self.malformed.load(Ordering::Relaxed),
            connects: self.connects.load(Ordering::Relaxed),
            disconnects: self.disconnects.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of [`LinkCounters`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LinkStats {
    /// Chunk events accepted from upstream
    pub events: u64,
    /// Events skipped because they could not be decoded
    pub malformed_events: u64,
    /// Successful connections, including the first
    pub connects: u64,
    /// Connections lost
    pub disconnects: u64,
}

impl LinkStats {
    /// Reconnections after the first successful connect
    pub fn reconnects(&self) -> u64 {
        self.connects.saturating_sub(1)
    }
}
