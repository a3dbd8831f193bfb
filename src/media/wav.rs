//! WAVE decoding through symphonia
//!
//! Only integer PCM (8, 16, 24 or 32 bit) is accepted. Decoded samples come
//! back from symphonia as full-scale `i32` and are packed again at the
//! source width, so the bytes handed to the chunker match the file's data
//! chunk.

use std::io::Cursor;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{
    CodecType, DecoderOptions, CODEC_TYPE_NULL, CODEC_TYPE_PCM_S16LE, CODEC_TYPE_PCM_S24LE,
    CODEC_TYPE_PCM_S32LE, CODEC_TYPE_PCM_U8,
};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use bytes::Bytes;

use super::asset::AssetError;
use super::chunk::AudioFormat;

/// Decoded WAVE file: format plus raw interleaved PCM
#[derive(Debug, Clone)]
pub struct WavData {
    pub format: AudioFormat,
    pub pcm: Bytes,
}

/// Bytes per sample for the integer PCM codecs we pass through
fn sample_width(codec: CodecType) -> Option<u16> {
    match codec {
        CODEC_TYPE_PCM_U8 => Some(1),
        CODEC_TYPE_PCM_S16LE => Some(2),
        CODEC_TYPE_PCM_S24LE => Some(3),
        CODEC_TYPE_PCM_S32LE => Some(4),
        _ => None,
    }
}

/// Decode a complete WAVE file held in memory
pub fn decode(data: Vec<u8>) -> Result<WavData, AssetError> {
    let source = MediaSourceStream::new(Box::new(Cursor::new(data)), Default::default());
    let mut hint = Hint::new();
    hint.with_extension("wav");

    let probed = symphonia::default::get_probe().format(
        &hint,
        source,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    let mut reader = probed.format;

    let track = reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(AssetError::MissingParameter("audio track"))?;
    let track_id = track.id;
    let params = track.codec_params.clone();

    let width = sample_width(params.codec)
        .ok_or_else(|| AssetError::UnsupportedCodec(format!("{:?}", params.codec)))?;
    let sample_rate = params.sample_rate.ok_or(AssetError::MissingParameter("sample rate"))?;
    let channels = params
        .channels
        .map(|channels| channels.count() as u16)
        .ok_or(AssetError::MissingParameter("channel layout"))?;

    let mut decoder = symphonia::default::get_codecs().make(&params, &DecoderOptions::default())?;
    let mut pcm = Vec::with_capacity(params.n_frames.unwrap_or(0) as usize * (channels * width) as usize);

    loop {
        let packet = match reader.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(reason)) => {
                tracing::warn!(reason, "Skipping undecodable packet");
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let mut samples = SampleBuffer::<i32>::new(decoded.capacity() as u64, *decoded.spec());
        samples.copy_interleaved_ref(decoded);
        for &sample in samples.samples() {
            pack_sample(&mut pcm, sample, width);
        }
    }

    Ok(WavData {
        format: AudioFormat::new(sample_rate, channels, width),
        pcm: Bytes::from(pcm),
    })
}

/// Narrow a full-scale sample back to `width` little-endian bytes
fn pack_sample(out: &mut Vec<u8>, sample: i32, width: u16) {
    match width {
        // 8-bit WAVE is unsigned
        1 => out.push(((sample >> 24) + 128) as u8),
        2 => out.extend_from_slice(&((sample >> 16) as i16).to_le_bytes()),
        3 => out.extend_from_slice(&(sample >> 8).to_le_bytes()[..3]),
        _ => out.extend_from_slice(&sample.to_le_bytes()),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use bytes::{BufMut, BytesMut};

    const WAVE_FORMAT_PCM: u16 = 0x0001;
    const WAVE_FORMAT_IEEE_FLOAT: u16 = 0x0003;

    fn build(tag: u16, format: AudioFormat, pcm: &[u8], extra: Option<(&[u8; 4], &[u8])>) -> Vec<u8> {
        let mut body = BytesMut::new();
        body.put_slice(b"WAVE");

        body.put_slice(b"fmt ");
        body.put_u32_le(16);
        body.put_u16_le(tag);
        body.put_u16_le(format.channels);
        body.put_u32_le(format.sample_rate);
        body.put_u32_le(format.sample_rate * format.frame_size() as u32);
        body.put_u16_le(format.frame_size() as u16);
        body.put_u16_le(format.bits_per_sample());

        if let Some((id, data)) = extra {
            body.put_slice(id);
            body.put_u32_le(data.len() as u32);
            body.put_slice(data);
        }

        body.put_slice(b"data");
        body.put_u32_le(pcm.len() as u32);
        body.put_slice(pcm);

        let mut file = BytesMut::new();
        file.put_slice(b"RIFF");
        file.put_u32_le(body.len() as u32);
        file.put_slice(&body);
        file.to_vec()
    }

    /// Build a minimal PCM WAVE file, optionally with an extra chunk before `data`
    pub(crate) fn build_wav(format: AudioFormat, pcm: &[u8], extra: Option<(&[u8; 4], &[u8])>) -> Vec<u8> {
        build(WAVE_FORMAT_PCM, format, pcm, extra)
    }

    #[test]
    fn test_decode_16bit_stereo() {
        let format = AudioFormat::new(8_000, 2, 2);
        let wav = build_wav(format, &[1, 2, 3, 4, 5, 6, 7, 8], None);

        let decoded = decode(wav).unwrap();
        assert_eq!(decoded.format, format);
        assert_eq!(&decoded.pcm[..], &[1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_decode_8bit_skips_unknown_chunks() {
        let format = AudioFormat::new(22_050, 1, 1);
        let wav = build_wav(format, &[9, 128, 200, 0], Some((b"junk", b"abcd")));

        let decoded = decode(wav).unwrap();
        assert_eq!(decoded.format.sample_width, 1);
        assert_eq!(decoded.format.sample_rate, 22_050);
        assert_eq!(&decoded.pcm[..], &[9, 128, 200, 0]);
    }

    #[test]
    fn test_pack_sample_widths() {
        let mut out = Vec::new();
        pack_sample(&mut out, 0x0201_0000, 2);
        pack_sample(&mut out, 0x0302_0100, 3);
        pack_sample(&mut out, i32::MIN, 1);
        assert_eq!(out, vec![0x01, 0x02, 0x01, 0x02, 0x03, 0x00]);
    }

    #[test]
    fn test_decode_rejects_non_wave() {
        let result = decode(b"definitely not an audio file".to_vec());
        assert!(matches!(result, Err(AssetError::Decode(_))));
    }

    #[test]
    fn test_decode_rejects_float() {
        let format = AudioFormat::new(8_000, 1, 4);
        let wav = build(WAVE_FORMAT_IEEE_FLOAT, format, &[0; 8], None);

        let result = decode(wav);
        assert!(matches!(
            result,
            Err(AssetError::UnsupportedCodec(_) | AssetError::Decode(_))
        ));
    }

    #[test]
    fn test_decode_missing_data() {
        let mut file = BytesMut::new();
        file.put_slice(b"RIFF");
        file.put_u32_le(4);
        file.put_slice(b"WAVE");

        assert!(decode(file.to_vec()).is_err());
    }
}
