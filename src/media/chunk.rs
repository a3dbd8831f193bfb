//! Audio chunk types
//!
//! A [`Chunk`] is the immutable unit passed between the broadcaster, the
//! history buffer and every listener queue. The payload is a `Bytes`, so
//! cloning a chunk for each listener only bumps a reference count.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// PCM format of a loaded asset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    /// Samples per second per channel
    pub sample_rate: u32,
    /// Interleaved channel count
    pub channels: u16,
    /// Bytes per sample (2 for 16-bit)
    pub sample_width: u16,
}

impl AudioFormat {
    /// Create a new format description
    pub fn new(sample_rate: u32, channels: u16, sample_width: u16) -> Self {
        Self {
            sample_rate,
            channels,
            sample_width,
        }
    }

    /// Bits per sample
    pub fn bits_per_sample(&self) -> u16 {
        self.sample_width * 8
    }

    /// Size of one interleaved frame in bytes
    pub fn frame_size(&self) -> usize {
        self.channels as usize * self.sample_width as usize
    }

    /// Number of payload bytes covering `duration`
    ///
    /// Computed per whole millisecond and rounded up to an even byte count so
    /// 16-bit samples never straddle two chunks.
    pub fn chunk_size(&self, duration: Duration) -> usize {
        let bytes_per_ms = self.sample_rate as usize * self.frame_size() / 1000;
        let size = bytes_per_ms * duration.as_millis() as usize;
        if size % 2 != 0 {
            size + 1
        } else {
            size
        }
    }

    /// Summary used in status documents
    pub fn info(&self) -> AudioFormatInfo {
        AudioFormatInfo {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: self.bits_per_sample(),
        }
    }
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self::new(44_100, 1, 2)
    }
}

/// Human-facing format summary, as carried in `audio_format` fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFormatInfo {
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
}

/// Position of a chunk within the looping asset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceInfo {
    /// Opaque id of the current loop traversal, regenerated at each wrap
    pub interval_id: Arc<str>,
    /// Number of loop traversals started so far
    pub loop_count: u64,
    /// Index within the current traversal
    pub position: u32,
    /// Chunks per traversal
    pub total_chunks: u32,
}

/// One fixed-duration slice of audio plus its metadata
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Encoded audio (zero-copy via reference counting)
    pub payload: Bytes,
    /// Format of the payload
    pub format: AudioFormat,
    /// Loop/interval identity
    pub sequence: SequenceInfo,
    /// Wall-clock emission time in milliseconds since the UNIX epoch
    pub produced_at: u64,
}

impl Chunk {
    /// Create a new chunk
    pub fn new(payload: Bytes, format: AudioFormat, sequence: SequenceInfo, produced_at: u64) -> Self {
        Self {
            payload,
            format,
            sequence,
            produced_at,
        }
    }

    /// Payload length in bytes
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Whether the payload is empty
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Current wall-clock time in milliseconds since the UNIX epoch
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
