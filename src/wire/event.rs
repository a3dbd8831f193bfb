//! JSON event documents
//!
//! Chunks travel as JSON objects with the payload hex-encoded in `audio`.
//! The producer emits [`ChunkEvent`]s; the relay emits [`DeliveryEvent`]s,
//! which are chunk events plus relay metadata.

use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::hex::{self, HexError};
use crate::history::BufferStats;
use crate::media::{AudioFormat, AudioFormatInfo, Chunk, SequenceInfo};
use crate::registry::DeliveryRecord;

/// Event decoding failure
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    /// Not JSON, or a required field is missing or mistyped
    #[error("invalid event JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Top-level JSON value is not an object
    #[error("event is not a JSON object")]
    NotAnObject,

    /// `audio` field is not valid hex
    #[error("invalid audio payload: {0}")]
    Hex(#[from] HexError),
}

fn default_sample_rate() -> u32 {
    AudioFormat::default().sample_rate
}

fn default_channels() -> u16 {
    AudioFormat::default().channels
}

fn default_sample_width() -> u16 {
    AudioFormat::default().sample_width
}

/// A chunk as it appears on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkEvent {
    #[serde(default)]
    pub interval_id: String,
    #[serde(default)]
    pub loop_count: u64,
    #[serde(default)]
    pub position: u32,
    #[serde(default)]
    pub total_chunks: u32,
    /// Production time in milliseconds since the UNIX epoch, 0 when absent
    #[serde(default)]
    pub timestamp: u64,
    /// Hex-encoded payload
    pub audio: String,
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_channels")]
    pub channels: u16,
    #[serde(default = "default_sample_width")]
    pub sample_width: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_format: Option<AudioFormatInfo>,
}

impl ChunkEvent {
    /// Decode the payload and rebuild the chunk
    pub fn into_chunk(self) -> Result<Chunk, EventError> {
        let payload = Bytes::from(hex::decode(&self.audio)?);
        let format = AudioFormat::new(self.sample_rate, self.channels, self.sample_width);
        let sequence = SequenceInfo {
            interval_id: Arc::from(self.interval_id),
            loop_count: self.loop_count,
            position: self.position,
            total_chunks: self.total_chunks,
        };
        Ok(Chunk::new(payload, format, sequence, self.timestamp))
    }
}

impl From<&Chunk> for ChunkEvent {
    fn from(chunk: &Chunk) -> Self {
        Self {
            interval_id: chunk.sequence.interval_id.to_string(),
            loop_count: chunk.sequence.loop_count,
            position: chunk.sequence.position,
            total_chunks: chunk.sequence.total_chunks,
            timestamp: chunk.produced_at,
            audio: hex::encode(&chunk.payload),
            sample_rate: chunk.format.sample_rate,
            channels: chunk.format.channels,
            sample_width: chunk.format.sample_width,
            audio_format: Some(chunk.format.info()),
        }
    }
}

/// A delivery record as sent to relay listeners
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryEvent {
    #[serde(flatten)]
    pub chunk: ChunkEvent,
    pub relay_id: String,
    pub relay_timestamp: u64,
    pub source_timestamp: u64,
    pub configured_delay_ms: u32,
    pub actual_delay_ms: i64,
    pub buffer_stats: BufferStats,
}

impl From<&DeliveryRecord> for DeliveryEvent {
    fn from(record: &DeliveryRecord) -> Self {
        Self {
            chunk: ChunkEvent::from(&record.chunk),
            relay_id: record.relay_id.to_string(),
            relay_timestamp: record.relay_timestamp,
            source_timestamp: record.source_timestamp(),
            configured_delay_ms: record.configured_delay_ms,
            actual_delay_ms: record.actual_delay_ms,
            buffer_stats: record.buffer_stats,
        }
    }
}

/// Result of decoding one upstream event
#[derive(Debug, Clone)]
pub enum InboundEvent {
    /// An audio chunk
    Chunk(Chunk),
    /// Any other JSON object, such as the producer's initial status
    Other(serde_json::Map<String, serde_json::Value>),
}

/// Decode one upstream event payload
///
/// Objects without an `audio` field are passed through as
/// [`InboundEvent::Other`]. Objects that carry one are chunk events; any
/// other field may be missing and takes its default.
pub fn decode_inbound(data: &str) -> Result<InboundEvent, EventError> {
    let value: serde_json::Value = serde_json::from_str(data)?;
    let serde_json::Value::Object(object) = value else {
        return Err(EventError::NotAnObject);
    };

    if !object.contains_key("audio") {
        return Ok(InboundEvent::Other(object));
    }

    let event: ChunkEvent = serde_json::from_value(serde_json::Value::Object(object))?;
    Ok(InboundEvent::Chunk(event.into_chunk()?))
}

/// Serialize a chunk as a producer event
pub fn encode_chunk(chunk: &Chunk) -> Result<String, EventError> {
    Ok(serde_json::to_string(&ChunkEvent::from(chunk))?)
}

/// Serialize a delivery record as a relay event
pub fn encode_delivery(record: &DeliveryRecord) -> Result<String, EventError> {
    Ok(serde_json::to_string(&DeliveryEvent::from(record))?)
}
