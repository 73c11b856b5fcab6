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
use std::sync::Arc;

use tracing::{debug, error, info};

use crate::audio::OutputDevice;
use crate::samples::SampleBank;

/// Plays bank samples through the output device.
pub struct PlaybackEngine {
    output: Arc<dyn OutputDevice>,
    bank: Arc<SampleBank>,
}

impl PlaybackEngine {
    pub fn new(output: Arc<dyn OutputDevice>, bank: Arc<SampleBank>) -> PlaybackEngine {
        PlaybackEngine { output, bank }
    }

    /// Plays a sample right away, on top of anything already sounding. Unknown
    /// samples and device errors are logged and otherwise ignored.
    pub fn play(&self, sample_id: &str) {
        let Some(audio) = self.bank.get(sample_id) else {
            return;
        };

        if self.output.is_suspended() {
            if let Err(e) = self.output.resume() {
                error!(device = %self.output, err = %e, "Unable to resume output device");
                return;
            }
            info!(device = %self.output, "Resumed suspended output device");
        }

        let audio = if audio.sample_rate() != self.output.sample_rate() {
            Arc::new(audio.resampled(self.output.sample_rate()))
        } else {
            audio
        };

        match self.output.play(audio) {
            Ok(()) => debug!(sample = sample_id, "Playing sample"),
            Err(e) => error!(sample = sample_id, err = %e, "Unable to play sample"),
        }
    }

    pub fn output(&self) -> &Arc<dyn OutputDevice> {
        &self.output
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::audio::{mock, OutputDevice as _};
    use crate::samples::Catalog;

    fn engine(device: &mock::OutputDevice, rate: u32) -> PlaybackEngine {
        let bank = Arc::new(SampleBank::new(Catalog::builtin(), rate));
        bank.load();
        PlaybackEngine::new(Arc::new(device.clone()), bank)
    }

    #[test]
    fn test_play_known_sample() {
        let device = mock::OutputDevice::get("mock", 44100);
        let playback = engine(&device, 44100);

        playback.play("tk1");
        let played = device.played();
        assert_eq!(played.len(), 1);
        assert_eq!(played[0].frames(), 6615);

        // The kick renders to both channels of the device.
        let rendered = device.render(100);
        let left: Vec<f32> = rendered.iter().step_by(2).copied().collect();
        let right: Vec<f32> = rendered.iter().skip(1).step_by(2).copied().collect();
        assert_eq!(left, right);
        assert_eq!(left.as_slice(), &played[0].channel(0).unwrap()[..100]);
    }

    #[test]
    fn test_unknown_sample_is_ignored() {
        let device = mock::OutputDevice::get("mock", 44100);
        let playback = engine(&device, 44100);

        playback.play("nope");
        assert!(device.played().is_empty());
    }

    #[test]
    fn test_resumes_suspended_device() {
        let device = mock::OutputDevice::get("mock-suspended", 44100);
        let playback = engine(&device, 44100);
        assert!(device.is_suspended());

        playback.play("ts1");
        assert!(!device.is_suspended());
        assert_eq!(device.resume_count(), 1);
        assert_eq!(device.played().len(), 1);

        device.suspend();
        playback.play("ts1");
        assert_eq!(device.resume_count(), 2);
        assert_eq!(device.played().len(), 2);
    }

    #[test]
    fn test_overlapping_playback_is_additive() {
        let device = mock::OutputDevice::get("mock", 44100);
        let playback = engine(&device, 44100);

        playback.play("ts1");
        playback.play("ts1");
        let snare = device.played()[0].clone();
        let rendered = device.render(10);
        for frame in 0..10 {
            let expected = snare.channel(0).unwrap()[frame] * 2.0;
            assert!((rendered[frame * 2] - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn test_resamples_to_device_rate() {
        let device = mock::OutputDevice::get("mock", 48000);
        let playback = engine(&device, 44100);

        playback.play("lm1");
        let played = device.played();
        assert_eq!(played[0].sample_rate(), 48000);
    }
}
