// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! WAV serialization.
//!
//! Mixdowns are written as canonical 16-bit PCM with a fixed 44 byte header:
//!
//! ```text
//! offset  size  field
//!      0     4  "RIFF"
//!      4     4  file length - 8
//!      8     4  "WAVE"
//!     12     4  "fmt "
//!     16     4  16 (fmt chunk size)
//!     20     2  1 (linear PCM)
//!     22     2  channels
//!     24     4  sample rate
//!     28     4  byte rate (sample rate * channels * 2)
//!     32     2  block align (channels * 2)
//!     34     2  16 (bits per sample)
//!     36     4  "data"
//!     40     4  data length
//!     44     -  interleaved little-endian i16 samples
//! ```
//!
//! Finalized recordings are kept as 32-bit float WAV so that capture is lossless.

use std::io::Cursor;

use hound::{SampleFormat, WavSpec, WavWriter};

use super::buffer::DecodedAudio;

/// Size of the canonical PCM header.
pub const WAV_HEADER_LEN: usize = 44;

const PCM_BITS_PER_SAMPLE: u16 = 16;

#[derive(Debug, thiserror::Error)]
pub enum WavError {
    #[error("audio has no channels")]
    NoChannels,

    #[error("audio too large for a WAV container ({0} bytes of sample data)")]
    TooLarge(u64),

    #[error("WAV write error: {0}")]
    Write(#[from] hound::Error),
}

/// Converts a float sample to 16-bit PCM. Negative samples are scaled by 32768 and
/// non-negative samples by 32767, so both -1.0 and 1.0 land exactly on the ends of
/// the i16 range. Anything outside [-1, 1] is clamped rather than wrapped.
#[inline]
pub fn f32_to_i16(sample: f32) -> i16 {
    // NaN maps to silence.
    let sample = if sample.is_nan() {
        0.0
    } else {
        sample.clamp(-1.0, 1.0)
    };

    let scaled = if sample < 0.0 {
        sample * 32768.0
    } else {
        sample * 32767.0
    };

    scaled.round().clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

/// Encodes the audio as a 16-bit PCM WAV byte stream.
pub fn encode_pcm16(audio: &DecodedAudio) -> Result<Vec<u8>, WavError> {
    let channels = audio.channel_count();
    if channels == 0 {
        return Err(WavError::NoChannels);
    }

    let block_align = channels as u64 * (PCM_BITS_PER_SAMPLE as u64 / 8);
    let data_len = audio.frames() as u64 * block_align;
    if data_len + WAV_HEADER_LEN as u64 - 8 > u32::MAX as u64 {
        return Err(WavError::TooLarge(data_len));
    }

    let spec = WavSpec {
        channels,
        sample_rate: audio.sample_rate(),
        bits_per_sample: PCM_BITS_PER_SAMPLE,
        sample_format: SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(WAV_HEADER_LEN + data_len as usize));
    {
        let mut writer = WavWriter::new(&mut cursor, spec)?;
        for frame in 0..audio.frames() {
            for channel in audio.channels() {
                writer.write_sample(f32_to_i16(channel[frame]))?;
            }
        }
        writer.finalize()?;
    }

    Ok(cursor.into_inner())
}

/// Encodes interleaved float samples as a 32-bit float WAV byte stream.
pub fn encode_float32(
    interleaved: &[f32],
    channels: u16,
    sample_rate: u32,
) -> Result<Vec<u8>, WavError> {
    if channels == 0 {
        return Err(WavError::NoChannels);
    }

    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec)?;
        for sample in interleaved {
            writer.write_sample(*sample)?;
        }
        writer.finalize()?;
    }

    Ok(cursor.into_inner())
}
