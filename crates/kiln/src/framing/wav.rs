//! PCM and WAV helpers for synthesized speech.
//!
//! Audio leaves the crate as mono, 16-bit, little-endian PCM. A WAV header
//! with an empty data chunk is sent ahead of streamed audio so players can
//! start decoding before the length is known.

use std::io::Cursor;
use base64::Engine;
use crate::error::Result;

pub const DEFAULT_SAMPLE_RATE: u32 = 24_000;
const CHANNELS: u16 = 1;
const BITS_PER_SAMPLE: u16 = 16;

/// Clips samples to `[-1, 1]` and scales them to signed 16-bit integers.
///
/// Scaling truncates toward zero.
pub fn quantize(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|sample| (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
        .collect()
}

/// Raw little-endian bytes of 16-bit PCM samples.
pub fn pcm16_bytes(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|sample| sample.to_le_bytes()).collect()
}

/// Quantizes a waveform segment straight to PCM bytes.
pub fn pcm16_from_waveform(samples: &[f32]) -> Vec<u8> {
    pcm16_bytes(&quantize(samples))
}

fn spec(sample_rate: u32) -> hound::WavSpec {
    hound::WavSpec {
        channels: CHANNELS,
        sample_rate,
        bits_per_sample: BITS_PER_SAMPLE,
        sample_format: hound::SampleFormat::Int,
    }
}

/// A complete WAV file holding `samples`.
pub fn encode_wav(samples: &[i16], sample_rate: u32) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec(sample_rate))?;
        for sample in samples {
            writer.write_sample(*sample)?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

/// A WAV header announcing zero samples, sent before streamed PCM chunks.
pub fn wav_header(sample_rate: u32) -> Result<Vec<u8>> {
    encode_wav(&[], sample_rate)
}

pub fn duration_ms(sample_count: usize, sample_rate: u32) -> u64 {
    if sample_rate == 0 {
        return 0;
    }
    sample_count as u64 * 1000 / sample_rate as u64
}

pub fn base64_encode(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}
