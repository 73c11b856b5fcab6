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
// Realtime mixing of one-shot voices that can be used by both CPAL and mock outputs.
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::buffer::DecodedAudio;

/// Global atomic counter for generating unique voice IDs
static VOICE_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// A one-shot buffer that is currently sounding.
struct ActiveVoice {
    /// Unique ID for this voice
    id: u64,
    /// The audio being played
    audio: Arc<DecodedAudio>,
    /// Next frame to render
    position: usize,
}

/// Additive mixer of concurrently playing one-shots. Voices are summed without
/// any ducking or gain compensation; the output callback is responsible for
/// whatever the device does with values beyond full scale.
#[derive(Clone)]
pub struct AudioMixer {
    /// Voices that still have frames left to render
    voices: Arc<Mutex<Vec<ActiveVoice>>>,
    /// Number of output channels
    num_channels: u16,
    /// Sample rate
    sample_rate: u32,
}

impl AudioMixer {
    /// Creates a new audio mixer
    pub fn new(num_channels: u16, sample_rate: u32) -> Self {
        Self {
            voices: Arc::new(Mutex::new(Vec::new())),
            num_channels,
            sample_rate,
        }
    }

    /// Starts a voice for the given audio and returns its ID.
    pub fn add_voice(&self, audio: Arc<DecodedAudio>) -> u64 {
        let id = VOICE_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
        self.voices.lock().push(ActiveVoice {
            id,
            audio,
            position: 0,
        });
        id
    }

    /// Stops every active voice.
    pub fn clear(&self) {
        self.voices.lock().clear();
    }

    /// Returns the number of voices still sounding.
    pub fn active_voices(&self) -> usize {
        self.voices.lock().len()
    }

    /// Returns true if the voice with the given ID is still sounding.
    pub fn is_active(&self, id: u64) -> bool {
        self.voices.lock().iter().any(|voice| voice.id == id)
    }

    /// Mixes `num_frames` interleaved frames into `output`, overwriting it.
    /// Mono voices feed every output channel; otherwise source channel n feeds
    /// output channel n modulo the output channel count.
    pub fn process_into_output(&self, output: &mut [f32], num_frames: usize) {
        let num_channels = self.num_channels as usize;
        let len = (num_frames * num_channels).min(output.len());
        output[..len].fill(0.0);
        if num_channels == 0 {
            return;
        }

        let mut voices = self.voices.lock();
        voices.retain_mut(|voice| {
            let remaining = voice.audio.frames().saturating_sub(voice.position);
            let to_mix = remaining.min(len / num_channels);
            let source_channels = voice.audio.channels();

            for (ch_idx, samples) in source_channels.iter().enumerate() {
                let samples = &samples[voice.position..voice.position + to_mix];
                if source_channels.len() == 1 {
                    for (frame, sample) in samples.iter().enumerate() {
                        for out in output[frame * num_channels..(frame + 1) * num_channels].iter_mut()
                        {
                            *out += sample;
                        }
                    }
                } else {
                    let out_ch = ch_idx % num_channels;
                    for (frame, sample) in samples.iter().enumerate() {
                        output[frame * num_channels + out_ch] += sample;
                    }
                }
            }

            voice.position += to_mix;
            voice.position < voice.audio.frames()
        });
    }

    /// Processes multiple frames of audio mixing
    pub fn process_frames(&self, num_frames: usize) -> Vec<f32> {
        let mut frames = vec![0.0f32; num_frames * self.num_channels as usize];
        self.process_into_output(&mut frames, num_frames);
        frames
    }

    /// Gets the number of output channels
    pub fn num_channels(&self) -> u16 {
        self.num_channels
    }

    /// Gets the sample rate
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}
