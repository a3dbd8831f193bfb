//! HTTP server for producers and relays
//!
//! ```text
//!   axum::serve ──► admit (connection limit) ──► Router
//!                                                  ├─ GET  /status     status document
//!                                                  ├─ POST /set-delay  change a listener's delay
//!                                                  └─ GET  /stream     attach ─► recv ─► SSE ─► detach on drop
//! ```

pub mod config;
pub mod listener;
pub mod routes;

pub use config::{ServerConfig, DEFAULT_PRODUCER_PORT, DEFAULT_RELAY_PORT, MIN_KEEPALIVE_INTERVAL};
pub use listener::HttpServer;
pub use routes::{
    error_response, router, ProducerService, ProducerStatus, RelayService, StreamService, DEFAULT_LISTENER_DELAY_MS,
};
