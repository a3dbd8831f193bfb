//! Buffering relay
//!
//! A relay keeps one connection to an upstream producer and re-serves its
//! chunks to many listeners, each at its own delay.
//!
//! ```text
//!   upstream ──SSE──► SourceLink ──publish──► StreamHub ──► listeners
//!                        │                       ▲
//!                   LinkMonitor            playback task
//!              (state, counters, latest)   (every chunk_duration)
//! ```

pub mod config;
pub mod link;
pub mod service;
pub mod source;

pub use config::{RelayConfig, DEFAULT_RELAY_ID, DEFAULT_SOURCE_URL};
pub use link::{LinkMonitor, LinkState, SourceLink, UpstreamState};
pub use service::{Relay, RelayStatus, RelayTasks};
pub use source::{EventSource, EventStream};
