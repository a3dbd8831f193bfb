//! Server configuration

use std::net::SocketAddr;
use std::time::Duration;

/// Port the producer listens on by default
pub const DEFAULT_PRODUCER_PORT: u16 = 8000;

/// Port the relay listens on by default
pub const DEFAULT_RELAY_PORT: u16 = 8001;

/// Shortest keep-alive interval accepted
pub const MIN_KEEPALIVE_INTERVAL: Duration = Duration::from_millis(100);

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Maximum concurrent requests, open streams included (0 = unlimited)
    pub max_connections: usize,

    /// Largest request body accepted
    pub max_request_size: usize,

    /// Interval between SSE keep-alive comments on idle streams
    pub keepalive_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PRODUCER_PORT)),
            max_connections: 0, // Unlimited
            max_request_size: 64 * 1024,
            keepalive_interval: Duration::from_secs(15),
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set maximum connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the request body limit
    pub fn max_request_size(mut self, size: usize) -> Self {
        self.max_request_size = size;
        self
    }

    /// Set the keep-alive interval (at least [`MIN_KEEPALIVE_INTERVAL`])
    pub fn keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = interval.max(MIN_KEEPALIVE_INTERVAL);
        self
    }
}
