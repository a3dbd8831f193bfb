//! Listener registry configuration

/// Largest delay a listener may request, in milliseconds
pub const MAX_DELAY_MS: u32 = 15_000;

/// Default capacity of each listener's outbound queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 10;

/// Configuration for a [`ListenerRegistry`](super::ListenerRegistry)
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Capacity of each listener's outbound queue
    pub queue_capacity: usize,

    /// Upper bound applied to requested delays
    pub max_delay_ms: u32,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_delay_ms: MAX_DELAY_MS,
        }
    }
}

impl RegistryConfig {
    /// Set the per-listener queue capacity (at least 1)
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Set the largest accepted delay
    ///
    /// A value of 0 restricts every listener to real-time delivery.
    pub fn max_delay_ms(mut self, max: u32) -> Self {
        self.max_delay_ms = max;
        self
    }

    /// Clamp a requested delay into `[0, max_delay_ms]`
    pub fn clamp_delay(&self, requested_ms: i64) -> u32 {
        requested_ms.clamp(0, self.max_delay_ms as i64) as u32
    }
}
