//! Delivery records
//!
//! A record is a chunk augmented with per-listener relay metadata. It is
//! built once per delivery, since configured and observed delay differ from
//! one listener to the next.

use std::sync::Arc;

use crate::history::BufferStats;
use crate::media::{unix_millis, Chunk};

/// A chunk on its way to one listener
#[derive(Debug, Clone)]
pub struct DeliveryRecord {
    /// The delivered chunk
    pub chunk: Chunk,
    /// Identity of the hub that sent it
    pub relay_id: Arc<str>,
    /// Wall-clock send time in milliseconds
    pub relay_timestamp: u64,
    /// Delay the listener asked for
    pub configured_delay_ms: u32,
    /// Send time minus the chunk's production time
    pub actual_delay_ms: i64,
    /// Buffer occupancy at send time
    pub buffer_stats: BufferStats,
}

impl DeliveryRecord {
    /// Build a record stamped with the current wall-clock time
    pub fn new(chunk: Chunk, relay_id: Arc<str>, configured_delay_ms: u32, buffer_stats: BufferStats) -> Self {
        Self::at(chunk, relay_id, configured_delay_ms, buffer_stats, unix_millis())
    }

    /// Build a record stamped with `relay_timestamp`
    pub fn at(
        chunk: Chunk,
        relay_id: Arc<str>,
        configured_delay_ms: u32,
        buffer_stats: BufferStats,
        relay_timestamp: u64,
    ) -> Self {
        let actual_delay_ms = relay_timestamp as i64 - chunk.produced_at as i64;
        Self {
            chunk,
            relay_id,
            relay_timestamp,
            configured_delay_ms,
            actual_delay_ms,
            buffer_stats,
        }
    }

    /// Production time of the chunk, as reported upstream
    pub fn source_timestamp(&self) -> u64 {
        self.chunk.produced_at
    }
}
