//! Buffering and fan-out for one upstream
//!
//! A [`StreamHub`] pairs a [`HistoryBuffer`](crate::history::HistoryBuffer)
//! with a [`ListenerRegistry`](crate::registry::ListenerRegistry). The
//! producer runs one fed by its loop broadcaster; the relay runs one fed by
//! its source link.
//!
//! ```text
//!  publish(chunk) ──► history.append ──► realtime listeners (immediate)
//!                          │
//!  every chunk_duration ───┴──► resolve(delay) ──► delayed listeners
//! ```

pub mod config;
pub mod stream;

pub use config::HubConfig;
pub use stream::StreamHub;
