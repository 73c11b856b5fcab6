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

//! Fixed-length, fixed-rate audio held entirely in memory.

use std::fmt;
use std::time::Duration;

/// Decoded audio in planar layout (one Vec per channel).
///
/// Samples are normalized floats, nominally in [-1, 1]. Every channel has the
/// same number of frames.
#[derive(Clone, PartialEq)]
pub struct DecodedAudio {
    channels: Vec<Vec<f32>>,
    sample_rate: u32,
}

impl DecodedAudio {
    /// Creates decoded audio from planar channel data. Channels longer than the
    /// shortest one are truncated so that every channel has the same length.
    pub fn new(mut channels: Vec<Vec<f32>>, sample_rate: u32) -> DecodedAudio {
        let frames = channels.iter().map(|c| c.len()).min().unwrap_or(0);
        for channel in channels.iter_mut() {
            channel.truncate(frames);
        }

        DecodedAudio {
            channels,
            sample_rate,
        }
    }

    /// Creates single channel audio.
    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> DecodedAudio {
        DecodedAudio::new(vec![samples], sample_rate)
    }

    /// Creates silent audio with the given shape.
    pub fn silent(channel_count: u16, frames: usize, sample_rate: u32) -> DecodedAudio {
        DecodedAudio {
            channels: vec![vec![0.0; frames]; channel_count as usize],
            sample_rate,
        }
    }

    /// Creates decoded audio from interleaved samples. Trailing samples that do not
    /// make up a whole frame are dropped.
    pub fn from_interleaved(samples: &[f32], channel_count: u16, sample_rate: u32) -> DecodedAudio {
        let num_channels = channel_count.max(1) as usize;
        let frames = samples.len() / num_channels;

        let mut channels = vec![Vec::with_capacity(frames); num_channels];
        for frame in samples.chunks_exact(num_channels) {
            for (channel, sample) in channels.iter_mut().zip(frame) {
                channel.push(*sample);
            }
        }

        DecodedAudio {
            channels,
            sample_rate,
        }
    }

    /// Returns the number of channels.
    pub fn channel_count(&self) -> u16 {
        self.channels.len() as u16
    }

    /// Returns the number of frames (samples per channel).
    pub fn frames(&self) -> usize {
        self.channels.first().map(|c| c.len()).unwrap_or(0)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Returns true if there are no frames.
    pub fn is_empty(&self) -> bool {
        self.frames() == 0
    }

    /// Returns the duration of the audio.
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate as f64)
    }

    /// Returns the samples for one channel.
    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(|c| c.as_slice())
    }

    /// Returns all channels.
    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    /// Mutable access to one channel, used by in-place mixing.
    pub(crate) fn channel_mut(&mut self, index: usize) -> Option<&mut [f32]> {
        self.channels.get_mut(index).map(|c| c.as_mut_slice())
    }

    /// Returns the samples in interleaved order.
    pub fn interleaved(&self) -> Vec<f32> {
        let num_channels = self.channels.len();
        let mut samples = Vec::with_capacity(self.frames() * num_channels);
        for frame in 0..self.frames() {
            for channel in self.channels.iter() {
                samples.push(channel[frame]);
            }
        }
        samples
    }

    /// Returns the memory used by the sample data in bytes.
    pub fn memory_size(&self) -> usize {
        self.channels.iter().map(|c| c.len()).sum::<usize>() * std::mem::size_of::<f32>()
    }

    /// Returns a copy of this audio at the given sample rate using linear
    /// interpolation. Drum hits and voice takes don't need anything better.
    pub fn resampled(&self, target_rate: u32) -> DecodedAudio {
        if target_rate == self.sample_rate || self.sample_rate == 0 || target_rate == 0 {
            return self.clone();
        }

        let ratio = target_rate as f64 / self.sample_rate as f64;
        let source_frames = self.frames();
        let target_frames = (source_frames as f64 * ratio).ceil() as usize;

        let channels = self
            .channels
            .iter()
            .map(|samples| {
                let mut output = Vec::with_capacity(target_frames);
                for target_frame in 0..target_frames {
                    let source_pos = target_frame as f64 / ratio;
                    let source_frame = source_pos.floor() as usize;
                    let frac = source_pos.fract() as f32;

                    let s0 = samples.get(source_frame).copied().unwrap_or(0.0);
                    let s1 = samples.get(source_frame + 1).copied().unwrap_or(s0);
                    output.push(s0 + (s1 - s0) * frac);
                }
                output
            })
            .collect();

        DecodedAudio {
            channels,
            sample_rate: target_rate,
        }
    }
}

impl fmt::Debug for DecodedAudio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodedAudio")
            .field("channels", &self.channel_count())
            .field("frames", &self.frames())
            .field("sample_rate", &self.sample_rate)
            .finish()
    }
}
