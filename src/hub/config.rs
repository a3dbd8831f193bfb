//! Hub configuration

use std::time::Duration;

use crate::registry::RegistryConfig;

/// Configuration for a [`StreamHub`](super::StreamHub)
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Identity stamped on every delivery record
    pub id: String,

    /// Duration of one chunk; also the periodic delivery cadence
    pub chunk_duration: Duration,

    /// How much history to retain
    pub retention: Duration,

    /// Listener registry settings
    pub registry: RegistryConfig,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            id: "relay-buffered".to_string(),
            chunk_duration: Duration::from_millis(100),
            retention: Duration::from_secs(20),
            registry: RegistryConfig::default(),
        }
    }
}

impl HubConfig {
    /// Configuration for a producer: real-time only, short queues
    pub fn producer(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            registry: RegistryConfig::default().queue_capacity(5).max_delay_ms(0),
            ..Default::default()
        }
    }

    /// Set the hub identity
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Set the chunk duration
    pub fn chunk_duration(mut self, duration: Duration) -> Self {
        self.chunk_duration = duration;
        self
    }

    /// Set the retention window
    pub fn retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    /// Set the per-listener queue capacity
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.registry = self.registry.queue_capacity(capacity);
        self
    }

    /// Set the largest accepted listener delay
    pub fn max_delay_ms(mut self, max: u32) -> Self {
        self.registry = self.registry.max_delay_ms(max);
        self
    }

    /// History capacity implied by retention and chunk duration
    pub fn history_capacity(&self) -> usize {
        let per_chunk = self.chunk_duration.as_secs_f64();
        if per_chunk > 0.0 {
            ((self.retention.as_secs_f64() / per_chunk).round() as usize).max(1)
        } else {
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HubConfig::default();

        assert_eq!(config.chunk_duration, Duration::from_millis(100));
        assert_eq!(config.history_capacity(), 200);
        assert_eq!(config.registry.queue_capacity, 10);
        assert_eq!(config.registry.max_delay_ms, 15_000);
    }

    #[test]
    fn test_producer_config() {
        let config = HubConfig::producer("source");

        assert_eq!(config.id, "source");
        assert_eq!(config.registry.queue_capacity, 5);
        assert_eq!(config.registry.max_delay_ms, 0);
    }

    #[test]
    fn test_builder_chaining() {
        let config = HubConfig::default()
            .id("edge-1")
            .chunk_duration(Duration::from_millis(50))
            .retention(Duration::from_secs(5))
            .queue_capacity(3)
            .max_delay_ms(4_000);

        assert_eq!(config.id, "edge-1");
        assert_eq!(config.history_capacity(), 100);
        assert_eq!(config.registry.queue_capacity, 3);
        assert_eq!(config.registry.max_delay_ms, 4_000);
    }
}
