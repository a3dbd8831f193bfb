//! Time-indexed chunk history
//!
//! Retains the most recent chunks from one upstream so listeners can be
//! served at an offset behind live. Each entry records when it was appended,
//! both as a monotonic instant and as seconds since the buffer's first
//! append (its relative time). Capacity is fixed; the oldest entry is evicted
//! on overflow and nothing is ever expired by age.

use std::collections::VecDeque;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::media::Chunk;

/// A chunk as retained by the history buffer
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    /// The retained chunk
    pub chunk: Chunk,
    /// When the entry was appended
    pub received_at: Instant,
    /// Seconds between the buffer's first append and this one
    pub relative_time: f64,
}

/// Snapshot of buffer occupancy
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BufferStats {
    /// Number of retained entries
    pub size: usize,
    /// Span in seconds between oldest and newest relative times
    pub duration: f64,
    /// Seconds since the oldest retained entry was appended
    pub oldest_age: f64,
}

/// Bounded ring of recent chunks
#[derive(Debug)]
pub struct HistoryBuffer {
    capacity: usize,
    entries: VecDeque<HistoryEntry>,
    start_time: Option<Instant>,
}

impl HistoryBuffer {
    /// Create a buffer holding at most `capacity` entries
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
            start_time: None,
        }
    }

    /// Create a buffer sized to retain `retention` worth of `chunk_duration` chunks
    pub fn with_retention(retention: Duration, chunk_duration: Duration) -> Self {
        let per_chunk = chunk_duration.as_secs_f64();
        let capacity = if per_chunk > 0.0 {
            (retention.as_secs_f64() / per_chunk).round() as usize
        } else {
            1
        };
        Self::new(capacity)
    }

    /// Append a chunk received now
    pub fn append(&mut self, chunk: Chunk) {
        self.append_at(chunk, Instant::now());
    }

    /// Append a chunk received at `now`
    ///
    /// The first append fixes the buffer's start time. Relative times never
    /// decrease even if `now` is earlier than the previous append.
    pub fn append_at(&mut self, chunk: Chunk, now: Instant) {
        let start = *self.start_time.get_or_insert(now);
        let mut relative_time = now.saturating_duration_since(start).as_secs_f64();
        if let Some(last) = self.entries.back() {
            relative_time = relative_time.max(last.relative_time);
        }

        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }

        self.entries.push_back(HistoryEntry {
            chunk,
            received_at: now,
            relative_time,
        });
    }

    /// Occupancy statistics as of now
    pub fn stats(&self) -> BufferStats {
        self.stats_at(Instant::now())
    }

    /// Occupancy statistics as of `now`
    pub fn stats_at(&self, now: Instant) -> BufferStats {
        let (first, last) = match (self.oldest(), self.newest()) {
            (Some(first), Some(last)) => (first, last),
            _ => return BufferStats::default(),
        };

        BufferStats {
            size: self.entries.len(),
            duration: if self.entries.len() > 1 {
                last.relative_time - first.relative_time
            } else {
                0.0
            },
            oldest_age: now.saturating_duration_since(first.received_at).as_secs_f64(),
        }
    }

    /// Instant of the first append, if any
    pub fn start_time(&self) -> Option<Instant> {
        self.start_time
    }

    /// Most recently appended entry
    pub fn newest(&self) -> Option<&HistoryEntry> {
        self.entries.back()
    }

    fn oldest(&self) -> Option<&HistoryEntry> {
        self.entries.front()
    }

    /// Retained entries in append order
    pub fn entries(&self) -> &VecDeque<HistoryEntry> {
        &self.entries
    }

    /// Number of retained entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been retained
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of retained entries
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Arc;

    use bytes::Bytes;

    use crate::media::{AudioFormat, SequenceInfo};

    pub(crate) fn make_chunk(position: u32) -> Chunk {
        Chunk::new(
            Bytes::from(vec![position as u8; 4]),
            AudioFormat::default(),
            SequenceInfo {
                interval_id: Arc::from("interval"),
                loop_count: 1,
                position,
                total_chunks: 100,
            },
            1_000 + position as u64,
        )
    }

    /// Buffer with entries appended at the given offsets (seconds) from `start`
    pub(crate) fn buffer_with_offsets(capacity: usize, start: Instant, offsets: &[f64]) -> HistoryBuffer {
        let mut buffer = HistoryBuffer::new(capacity);
        for (i, offset) in offsets.iter().enumerate() {
            buffer.append_at(make_chunk(i as u32), start + Duration::from_secs_f64(*offset));
        }
        buffer
    }

    #[test]
    fn test_append_sets_start_time_once() {
        let start = Instant::now();
        let mut buffer = HistoryBuffer::new(4);
        assert!(buffer.start_time().is_none());

        buffer.append_at(make_chunk(0), start);
        buffer.append_at(make_chunk(1), start + Duration::from_millis(100));

        assert_eq!(buffer.start_time(), Some(start));
        assert_eq!(buffer.entries()[0].relative_time, 0.0);
        assert!((buffer.entries()[1].relative_time - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let start = Instant::now();
        let buffer = buffer_with_offsets(3, start, &[0.0, 0.1, 0.2, 0.3, 0.4]);

        assert_eq!(buffer.len(), 3);
        let positions: Vec<u32> = buffer
            .entries()
            .iter()
            .map(|e| e.chunk.sequence.position)
            .collect();
        assert_eq!(positions, vec![2, 3, 4]);

        // Start time survives eviction of the first entry
        assert_eq!(buffer.start_time(), Some(start));
    }

    #[test]
    fn test_relative_time_never_decreases() {
        let start = Instant::now();
        let mut buffer = HistoryBuffer::new(4);
        buffer.append_at(make_chunk(0), start + Duration::from_millis(500));
        buffer.append_at(make_chunk(1), start + Duration::from_millis(900));
        // Out-of-order timestamp
        buffer.append_at(make_chunk(2), start + Duration::from_millis(700));

        let times: Vec<f64> = buffer.entries().iter().map(|e| e.relative_time).collect();
        assert!(times.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_with_retention() {
        let buffer = HistoryBuffer::with_retention(Duration::from_secs(20), Duration::from_millis(100));
        assert_eq!(buffer.capacity(), 200);

        let buffer = HistoryBuffer::with_retention(Duration::from_secs(1), Duration::ZERO);
        assert_eq!(buffer.capacity(), 1);
    }

    #[test]
    fn test_stats_empty() {
        let buffer = HistoryBuffer::new(10);
        assert_eq!(buffer.stats(), BufferStats::default());
    }

    #[test]
    fn test_stats_single_entry() {
        let start = Instant::now();
        let buffer = buffer_with_offsets(10, start, &[0.0]);

        let stats = buffer.stats_at(start + Duration::from_secs(2));
        assert_eq!(stats.size, 1);
        assert_eq!(stats.duration, 0.0);
        assert!((stats.oldest_age - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_stats_span() {
        let start = Instant::now();
        let buffer = buffer_with_offsets(10, start, &[0.0, 0.5, 1.0, 1.5]);

        let stats = buffer.stats_at(start + Duration::from_secs(3));
        assert_eq!(stats.size, 4);
        assert!((stats.duration - 1.5).abs() < 1e-9);
        assert!((stats.oldest_age - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_stats_does_not_mutate() {
        let start = Instant::now();
        let buffer = buffer_with_offsets(10, start, &[0.0, 0.5]);

        let first = buffer.stats_at(start + Duration::from_secs(1));
        let second = buffer.stats_at(start + Duration::from_secs(1));
        assert_eq!(first, second);
        assert_eq!(buffer.len(), 2);
    }
}
