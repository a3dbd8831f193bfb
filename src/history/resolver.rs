//! Delay resolution
//!
//! Maps a requested playback offset to the retained chunk that should be
//! delivered now. Resolution is a pure read of the buffer.
//!
//! ```text
//!  start_time                                     now
//!      |---------------------------------------------|
//!      |<-------- now - start_time ----------------->|
//!                          |<------- delay --------->|
//!                        target
//!  entries:  e0   e1   e2  | e3   e4   e5   ...
//!                          ^ first entry with relative_time >= target
//! ```

use std::time::Duration;

use tokio::time::Instant;

use super::buffer::{HistoryBuffer, HistoryEntry};

/// Resolve the entry to deliver for `delay` as of `now`
///
/// A zero delay always yields the newest entry. Otherwise the first entry
/// whose relative time is at or after `(now - start_time) - delay` is chosen.
/// Returns `None` when the buffer is empty or the target lies beyond the
/// newest entry; callers deliver nothing in that case.
pub fn resolve(buffer: &HistoryBuffer, delay: Duration, now: Instant) -> Option<&HistoryEntry> {
    if delay.is_zero() {
        return buffer.newest();
    }

    let start = buffer.start_time()?;
    let current = now.saturating_duration_since(start).as_secs_f64();
    let target = current - delay.as_secs_f64();

    let entries = buffer.entries();
    let index = entries.partition_point(|entry| entry.relative_time < target);
    entries.get(index)
}
