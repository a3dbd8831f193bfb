//! Broadcaster configuration

use std::time::Duration;

/// Configuration for a [`LoopBroadcaster`](super::LoopBroadcaster)
#[derive(Debug, Clone)]
pub struct BroadcasterConfig {
    /// Duration of each chunk the asset is split into
    pub chunk_duration: Duration,

    /// Delay before the first tick
    pub warmup: Duration,
}

impl Default for BroadcasterConfig {
    fn default() -> Self {
        Self {
            chunk_duration: Duration::from_millis(100),
            warmup: Duration::from_secs(1),
        }
    }
}

impl BroadcasterConfig {
    /// Set the chunk duration
    pub fn chunk_duration(mut self, duration: Duration) -> Self {
        self.chunk_duration = duration;
        self
    }

    /// Set the warm-up delay
    pub fn warmup(mut self, warmup: Duration) -> Self {
        self.warmup = warmup;
        self
    }

    /// Start ticking immediately
    pub fn no_warmup(mut self) -> Self {
        self.warmup = Duration::ZERO;
        self
    }
}
