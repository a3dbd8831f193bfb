//! Audio media handling
//!
//! This module provides:
//! - The [`Chunk`] unit shared by every stage of the pipeline
//! - PCM WAVE decoding through symphonia
//! - Pre-chunked looping assets

pub mod asset;
pub mod chunk;
pub mod wav;

pub use asset::{AssetError, AudioAsset};
pub use chunk::{unix_millis, AudioFormat, AudioFormatInfo, Chunk, SequenceInfo};
