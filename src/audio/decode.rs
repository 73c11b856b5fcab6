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

//! Decoding of encoded audio (WAV, FLAC, MP3, ...) into [`DecodedAudio`].

use std::fs::File;
use std::io::Cursor;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};
use tracing::{debug, warn};

use super::buffer::DecodedAudio;

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Unsupported or unrecognized audio data: {0}")]
    Unsupported(String),

    #[error("No audio track found")]
    NoAudioTrack,

    #[error("Sample rate not specified")]
    UnknownSampleRate,

    #[error("Audio stream is truncated: decoded {decoded} of {expected} frames")]
    Truncated { expected: u64, decoded: u64 },

    #[error("Audio decode error: {0}")]
    Audio(#[from] SymphoniaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Decodes an in-memory encoded audio stream.
pub fn decode_bytes(bytes: Vec<u8>) -> Result<DecodedAudio, DecodeError> {
    decode(Box::new(Cursor::new(bytes)), Hint::new())
}

/// Decodes an audio file from disk.
pub fn decode_file(path: &Path) -> Result<DecodedAudio, DecodeError> {
    let file = File::open(path).map_err(|e| {
        DecodeError::Io(std::io::Error::new(
            e.kind(),
            format!("{}: {}", path.display(), e),
        ))
    })?;

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(extension);
    }

    decode(Box::new(file), hint)
}

fn decode(source: Box<dyn MediaSource>, hint: Hint) -> Result<DecodedAudio, DecodeError> {
    let mss = MediaSourceStream::new(source, Default::default());

    let meta_opts: MetadataOptions = Default::default();
    let fmt_opts: FormatOptions = Default::default();
    let probed = get_probe()
        .format(&hint, mss, &fmt_opts, &meta_opts)
        .map_err(|e| DecodeError::Unsupported(e.to_string()))?;
    let mut format_reader = probed.format;

    let track = format_reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(DecodeError::NoAudioTrack)?;

    let track_id = track.id;
    let params = track.codec_params.clone();
    let sample_rate = params.sample_rate.ok_or(DecodeError::UnknownSampleRate)?;

    let decoder_opts: DecoderOptions = Default::default();
    let mut decoder = get_codecs()
        .make(&params, &decoder_opts)
        .map_err(|e| DecodeError::Unsupported(e.to_string()))?;

    let mut channels: Vec<Vec<f32>> = Vec::new();
    loop {
        let packet = match format_reader.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = decoder.decode(&packet)?;

        let spec = *decoded.spec();
        let frames = decoded.frames();
        let num_channels = spec.channels.count();
        if frames == 0 || num_channels == 0 {
            continue;
        }

        let mut sample_buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        sample_buffer.copy_planar_ref(decoded);
        let samples = sample_buffer.samples();

        if channels.is_empty() {
            channels = vec![Vec::new(); num_channels];
        }
        for (ch, channel) in channels.iter_mut().enumerate().take(num_channels) {
            channel.extend_from_slice(&samples[ch * frames..(ch + 1) * frames]);
        }
    }

    if channels.is_empty() {
        let num_channels = params.channels.map(|c| c.count()).unwrap_or(1);
        channels = vec![Vec::new(); num_channels];
    }

    let audio = DecodedAudio::new(channels, sample_rate);
    if let Some(expected) = params.n_frames {
        if (audio.frames() as u64) < expected {
            warn!(
                expected,
                decoded = audio.frames(),
                "Audio stream ended before its declared length"
            );
            return Err(DecodeError::Truncated {
                expected,
                decoded: audio.frames() as u64,
            });
        }
    }
    debug!(
        channels = audio.channel_count(),
        frames = audio.frames(),
        sample_rate,
        "Decoded audio"
    );
    Ok(audio)
}
