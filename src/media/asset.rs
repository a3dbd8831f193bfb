//! Pre-chunked audio asset
//!
//! The broadcaster never touches raw audio: it cycles through the
//! equal-length chunks prepared here. The trailing partial chunk is
//! zero-padded so every payload has the same length.

use std::path::Path;
use std::time::Duration;

use bytes::{Bytes, BytesMut};

use super::chunk::AudioFormat;
use super::wav;

/// Error type for asset loading
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    /// Asset file could not be read
    #[error("failed to read audio asset: {0}")]
    Io(#[from] std::io::Error),

    /// Container or codec could not be decoded
    #[error("failed to decode audio asset: {0}")]
    Decode(#[from] symphonia::core::errors::Error),

    /// Audio is not integer PCM
    #[error("unsupported audio codec {0}")]
    UnsupportedCodec(String),

    /// Decoder did not report a required stream parameter
    #[error("audio asset has no {0}")]
    MissingParameter(&'static str),

    /// Chunk duration too short to hold a single byte
    #[error("chunk duration {0:?} yields an empty chunk")]
    ChunkTooShort(Duration),

    /// Asset contains no audio
    #[error("audio asset is empty")]
    Empty,
}

/// Audio split into fixed-duration chunks
#[derive(Debug, Clone)]
pub struct AudioAsset {
    chunks: Vec<Bytes>,
    format: AudioFormat,
    chunk_duration: Duration,
}

impl AudioAsset {
    /// Split interleaved PCM into chunks of `chunk_duration`
    pub fn from_pcm(
        pcm: Bytes,
        format: AudioFormat,
        chunk_duration: Duration,
    ) -> Result<Self, AssetError> {
        let chunk_size = format.chunk_size(chunk_duration);
        if chunk_size == 0 {
            return Err(AssetError::ChunkTooShort(chunk_duration));
        }
        if pcm.is_empty() {
            return Err(AssetError::Empty);
        }

        let mut chunks = Vec::with_capacity(pcm.len().div_ceil(chunk_size));
        let mut offset = 0;
        while offset < pcm.len() {
            let end = (offset + chunk_size).min(pcm.len());
            if end - offset == chunk_size {
                chunks.push(pcm.slice(offset..end));
            } else {
                let mut padded = BytesMut::zeroed(chunk_size);
                padded[..end - offset].copy_from_slice(&pcm[offset..end]);
                chunks.push(padded.freeze());
            }
            offset = end;
        }

        Ok(Self {
            chunks,
            format,
            chunk_duration,
        })
    }

    /// Load a PCM WAVE file and chunk it
    pub async fn load(path: impl AsRef<Path>, chunk_duration: Duration) -> Result<Self, AssetError> {
        let path = path.as_ref();
        let data = tokio::fs::read(path).await?;
        let wav = wav::decode(data)?;
        let asset = Self::from_pcm(wav.pcm, wav.format, chunk_duration)?;

        tracing::info!(
            path = %path.display(),
            channels = asset.format.channels,
            sample_rate = asset.format.sample_rate,
            bits = asset.format.bits_per_sample(),
            chunks = asset.total_chunks(),
            total_ms = asset.total_duration().as_millis() as u64,
            "Loaded audio asset"
        );

        Ok(asset)
    }

    /// Chunk at `position`, wrapping past the end
    pub fn chunk_wrapping(&self, position: u32) -> &Bytes {
        // from_pcm never builds an empty asset
        &self.chunks[position as usize % self.chunks.len()]
    }

    /// Number of chunks in one traversal
    pub fn total_chunks(&self) -> u32 {
        self.chunks.len() as u32
    }

    /// PCM format shared by all chunks
    pub fn format(&self) -> AudioFormat {
        self.format
    }

    /// Duration covered by each chunk
    pub fn chunk_duration(&self) -> Duration {
        self.chunk_duration
    }

    /// Duration of one full traversal
    pub fn total_duration(&self) -> Duration {
        self.chunk_duration * self.total_chunks()
    }

    /// Payload length shared by all chunks
    pub fn chunk_size(&self) -> usize {
        self.chunks.first().map(Bytes::len).unwrap_or(0)
    }
}
