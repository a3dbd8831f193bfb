//! Relay configuration

use std::time::Duration;

use crate::hub::HubConfig;

/// Identity stamped on relay delivery records
pub const DEFAULT_RELAY_ID: &str = "relay-buffered";

/// Upstream used when none is configured
pub const DEFAULT_SOURCE_URL: &str = "http://audio-source:8000";

/// Relay configuration options
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Relay identity, also used as the hub id
    pub relay_id: String,

    /// Upstream producer URL
    pub source_url: String,

    /// Wait between a lost connection and the next attempt
    pub reconnect_backoff: Duration,

    /// History and listener settings
    pub hub: HubConfig,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            relay_id: DEFAULT_RELAY_ID.to_string(),
            source_url: DEFAULT_SOURCE_URL.to_string(),
            reconnect_backoff: Duration::from_secs(5),
            hub: HubConfig::default().id(DEFAULT_RELAY_ID),
        }
    }
}

impl RelayConfig {
    /// Set the relay id (and hub id)
    pub fn relay_id(mut self, id: impl Into<String>) -> Self {
        self.relay_id = id.into();
        self.hub.id = self.relay_id.clone();
        self
    }

    /// Set the upstream URL
    pub fn source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = url.into();
        self
    }

    /// Set the reconnect backoff
    pub fn reconnect_backoff(mut self, backoff: Duration) -> Self {
        self.reconnect_backoff = backoff;
        self
    }

    /// Replace the hub configuration, keeping the relay id
    pub fn hub(mut self, hub: HubConfig) -> Self {
        self.hub = hub.id(self.relay_id.clone());
        self
    }
}
