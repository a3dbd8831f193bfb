//! Upstream event source seam
//!
//! [`SourceLink`](super::SourceLink) is generic over where its events come
//! from. Production uses [`HttpEventSource`](crate::sse::HttpEventSource);
//! tests script their own.

use std::future::Future;

use crate::error::Result;

/// Something the relay can (re)connect to
pub trait EventSource: Send + Sync + 'static {
    /// Live connection yielding event payloads
    type Stream: EventStream;

    /// Open a new connection
    fn connect(&self) -> impl Future<Output = Result<Self::Stream>> + Send;

    /// Human-readable upstream location, for status and logs
    fn describe(&self) -> String;
}

/// An open upstream connection
pub trait EventStream: Send {
    /// Next event payload; `Ok(None)` when the upstream closed cleanly
    fn next_event(&mut self) -> impl Future<Output = Result<Option<String>>> + Send;
}
