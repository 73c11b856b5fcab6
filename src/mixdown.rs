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

//! Renders the stored track recordings into one stereo 16-bit WAV.
//!
//! Every selected recording is decoded at the working rate, then summed from
//! the start of the mix into a buffer one second longer than the longest
//! recording. Sums beyond full scale are clamped when the buffer is converted
//! to 16-bit samples.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use rayon::prelude::*;
use tracing::{info, span, Instrument, Level};

use crate::audio::decode::{decode_bytes, DecodeError};
use crate::audio::mixer::AudioMixer;
use crate::audio::wav::{encode_pcm16, WavError};
use crate::audio::DecodedAudio;
use crate::tracks::{Track, TrackAudioStore, TrackRecording};

/// Channels of every mixdown.
pub const MIX_CHANNELS: u16 = 2;

#[derive(Debug, thiserror::Error)]
pub enum MixdownError {
    #[error("unable to decode the recording of track {track_id}: {source}")]
    Decode {
        track_id: u32,
        #[source]
        source: DecodeError,
    },

    #[error("unable to encode the mixdown: {0}")]
    Encode(#[from] WavError),

    #[error("mixdown task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("unable to write the mixdown to {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// An encoded mixdown.
pub struct Mixdown {
    bytes: Vec<u8>,
    frames: usize,
    sample_rate: u32,
    tracks: Vec<u32>,
}

impl Mixdown {
    /// The WAV byte stream.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Frames in the mix, including the trailing second of padding.
    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        MIX_CHANNELS
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.frames as f64 / self.sample_rate as f64)
    }

    /// The tracks that went into the mix, in mix order.
    pub fn tracks(&self) -> &[u32] {
        &self.tracks
    }

    /// Writes the WAV to a file.
    pub fn write(&self, path: &Path) -> Result<(), MixdownError> {
        fs::write(path, &self.bytes).map_err(|source| MixdownError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        info!(
            path = ?path,
            bytes = self.bytes.len(),
            duration_ms = self.duration().as_millis(),
            "Wrote mixdown"
        );
        Ok(())
    }
}

/// Chooses the tracks to mix, in list order. With mute/solo respected, a track
/// is audible when it isn't muted and either nothing is soloed or it is.
pub fn audible_tracks(tracks: &[Track], respect_mute_solo: bool) -> Vec<u32> {
    let any_solo = tracks.iter().any(|track| track.is_solo);
    let mut seen = HashSet::new();

    tracks
        .iter()
        .filter(|track| {
            !respect_mute_solo || (!track.is_muted && (!any_solo || track.is_solo))
        })
        .filter(|track| seen.insert(track.id))
        .map(|track| track.id)
        .collect()
}

/// Mixes the track audio store down to a WAV.
pub struct MixdownEncoder {
    store: TrackAudioStore,
    sample_rate: u32,
    respect_mute_solo: bool,
}

impl MixdownEncoder {
    pub fn new(store: TrackAudioStore, sample_rate: u32, respect_mute_solo: bool) -> MixdownEncoder {
        MixdownEncoder {
            store,
            sample_rate,
            respect_mute_solo,
        }
    }

    /// Mixes the recordings of the given tracks. Returns `None` when there is
    /// nothing to export. A recording that fails to decode fails the whole
    /// mixdown; the store is never modified.
    pub async fn mixdown(&self, tracks: &[Track]) -> Result<Option<Mixdown>, MixdownError> {
        let span = span!(Level::INFO, "mixdown", tracks = tracks.len());
        self.mix(tracks).instrument(span).await
    }

    async fn mix(&self, tracks: &[Track]) -> Result<Option<Mixdown>, MixdownError> {
        if self.store.is_empty() {
            info!("No audio recorded to mix down");
            return Ok(None);
        }

        let snapshot = self.store.snapshot();
        let selected: Vec<(u32, Arc<TrackRecording>)> =
            audible_tracks(tracks, self.respect_mute_solo)
                .into_iter()
                .filter_map(|id| snapshot.get(&id).map(|recording| (id, recording.clone())))
                .collect();
        if selected.is_empty() {
            info!("No audible track has a recording");
            return Ok(None);
        }

        let sample_rate = self.sample_rate;
        let mixdown = tokio::task::spawn_blocking(move || render(&selected, sample_rate)).await??;
        match &mixdown {
            Some(mixdown) => info!(
                tracks = ?mixdown.tracks(),
                frames = mixdown.frames(),
                sample_rate,
                "Mixdown complete"
            ),
            None => info!("Recordings are empty, nothing to export"),
        }
        Ok(mixdown)
    }
}

/// Decodes, sums and encodes the recordings.
pub fn render(
    recordings: &[(u32, Arc<TrackRecording>)],
    sample_rate: u32,
) -> Result<Option<Mixdown>, MixdownError> {
    let decoded = recordings
        .par_iter()
        .map(|(track_id, recording)| {
            decode_bytes(recording.encoded().to_vec())
                .map(|audio| audio.resampled(sample_rate))
                .map_err(|source| MixdownError::Decode {
                    track_id: *track_id,
                    source,
                })
        })
        .collect::<Result<Vec<DecodedAudio>, MixdownError>>()?;

    // At the working rate the longest recording is a whole number of frames.
    let longest = decoded.iter().map(DecodedAudio::frames).max().unwrap_or(0);
    if longest == 0 {
        return Ok(None);
    }
    let frames = longest + sample_rate as usize;

    let mixer = AudioMixer::new(MIX_CHANNELS, sample_rate);
    for audio in decoded {
        mixer.add_voice(Arc::new(audio));
    }
    let mix = DecodedAudio::from_interleaved(&mixer.process_frames(frames), MIX_CHANNELS, sample_rate);

    Ok(Some(Mixdown {
        bytes: encode_pcm16(&mix)?,
        frames: mix.frames(),
        sample_rate,
        tracks: recordings.iter().map(|(id, _)| *id).collect(),
    }))
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use super::*;
    use crate::audio::wav::{f32_to_i16, WAV_HEADER_LEN};

    fn store_with(recordings: &[(u32, DecodedAudio)]) -> TrackAudioStore {
        let store = TrackAudioStore::new();
        for (id, audio) in recordings {
            store.insert(TrackRecording::encode(*id, audio, 1).unwrap());
        }
        store
    }

    fn tracks(ids: &[u32]) -> Vec<Track> {
        ids.iter().map(|id| Track::new(*id, "track")).collect()
    }

    fn read_samples(bytes: &[u8]) -> (hound::WavSpec, Vec<i16>) {
        let reader = hound::WavReader::new(Cursor::new(bytes.to_vec())).unwrap();
        let spec = reader.spec();
        let samples = reader.into_samples::<i16>().map(|s| s.unwrap()).collect();
        (spec, samples)
    }

    fn constant(value: f32, seconds: f64, rate: u32) -> DecodedAudio {
        DecodedAudio::mono(vec![value; (seconds * rate as f64) as usize], rate)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_empty_store() {
        let encoder = MixdownEncoder::new(TrackAudioStore::new(), 44100, true);
        assert!(encoder.mixdown(&tracks(&[1, 2])).await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_no_selected_audio() {
        let store = store_with(&[(1, constant(0.5, 0.1, 44100))]);
        let encoder = MixdownEncoder::new(store, 44100, true);
        assert!(encoder.mixdown(&tracks(&[2, 3])).await.unwrap().is_none());
        assert!(encoder.mixdown(&[]).await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_duration_is_padded() {
        let store = store_with(&[
            (1, constant(0.1, 1.0, 44100)),
            (2, constant(0.1, 2.5, 44100)),
        ]);
        let encoder = MixdownEncoder::new(store, 44100, true);
        let mixdown = encoder.mixdown(&tracks(&[1, 2])).await.unwrap().unwrap();

        let seconds = mixdown.duration().as_secs_f64();
        assert!(seconds >= 2.5, "{}", seconds);
        assert!(seconds <= 3.5, "{}", seconds);
        assert_eq!(mixdown.frames(), 110250 + 44100);
        assert_eq!(mixdown.tracks(), &[1, 2]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_wav_readback_matches_header() {
        let store = store_with(&[(1, constant(0.25, 0.5, 48000))]);
        let encoder = MixdownEncoder::new(store, 48000, true);
        let mixdown = encoder.mixdown(&tracks(&[1])).await.unwrap().unwrap();
        let bytes = mixdown.bytes();

        let data_size = u32::from_le_bytes([bytes[40], bytes[41], bytes[42], bytes[43]]) as usize;
        assert_eq!(data_size, bytes.len() - WAV_HEADER_LEN);

        let (spec, samples) = read_samples(bytes);
        assert_eq!(spec.channels, 2);
        assert_eq!(spec.sample_rate, 48000);
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(spec.sample_format, hound::SampleFormat::Int);
        assert_eq!(samples.len(), data_size / 2);
        assert_eq!(samples.len() / 2, mixdown.frames());

        assert_eq!(samples[0], f32_to_i16(0.25));
        assert_eq!(samples[1], f32_to_i16(0.25));
        assert_eq!(*samples.last().unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_sums_clamp() {
        let store = store_with(&[
            (1, DecodedAudio::mono(vec![1.0, -1.0, 0.75], 44100)),
            (2, DecodedAudio::mono(vec![1.0, -1.0, 0.75], 44100)),
        ]);
        let encoder = MixdownEncoder::new(store, 44100, true);
        let mixdown = encoder.mixdown(&tracks(&[1, 2])).await.unwrap().unwrap();

        let (_, samples) = read_samples(mixdown.bytes());
        assert_eq!(&samples[..6], &[32767, 32767, -32768, -32768, 32767, 32767]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_multichannel_routing() {
        let store = store_with(&[(
            1,
            DecodedAudio::new(vec![vec![0.1; 4], vec![0.2; 4], vec![0.3; 4]], 44100),
        )]);
        let encoder = MixdownEncoder::new(store, 44100, true);
        let mixdown = encoder.mixdown(&tracks(&[1])).await.unwrap().unwrap();

        let (_, samples) = read_samples(mixdown.bytes());
        assert_eq!(samples[0], f32_to_i16(0.1 + 0.3));
        assert_eq!(samples[1], f32_to_i16(0.2));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_resamples_to_working_rate() {
        let store = store_with(&[(1, constant(0.5, 1.0, 22050))]);
        let encoder = MixdownEncoder::new(store, 44100, true);
        let mixdown = encoder.mixdown(&tracks(&[1])).await.unwrap().unwrap();
        assert_eq!(mixdown.sample_rate(), 44100);
        assert_eq!(mixdown.frames(), 44100 * 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_decode_failure_leaves_store_untouched() {
        let store = store_with(&[(1, constant(0.5, 0.1, 44100))]);
        store.insert(TrackRecording::from_encoded(2, b"not audio at all".to_vec()));
        let before = store.snapshot();

        let encoder = MixdownEncoder::new(store.clone(), 44100, true);
        let result = encoder.mixdown(&tracks(&[1, 2])).await;
        assert!(matches!(result, Err(MixdownError::Decode { track_id: 2, .. })));

        let after = store.snapshot();
        assert_eq!(after.len(), 2);
        for (id, recording) in before.iter() {
            assert!(Arc::ptr_eq(recording, &after[id]));
        }

        // Leaving the broken track out still works.
        assert!(encoder.mixdown(&tracks(&[1])).await.unwrap().is_some());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_truncated_recording_fails_mixdown() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cut.wav");
        crate::testutil::write_wav(path.clone(), vec![vec![4096i16; 44100]; 2], 44100).unwrap();
        let mut bytes = std::fs::read(&path).unwrap();
        bytes.truncate(WAV_HEADER_LEN + 100 * 4);

        let store = store_with(&[(1, constant(0.5, 0.1, 44100))]);
        store.insert(TrackRecording::from_encoded(2, bytes));
        let encoder = MixdownEncoder::new(store, 44100, true);

        let result = encoder.mixdown(&tracks(&[1, 2])).await;
        assert!(matches!(
            result,
            Err(MixdownError::Decode {
                track_id: 2,
                source: DecodeError::Truncated { .. }
            })
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_mute_and_solo() {
        let store = store_with(&[
            (1, constant(0.5, 0.1, 44100)),
            (2, constant(0.25, 0.1, 44100)),
        ]);
        let first_sample = |mixdown: Mixdown| read_samples(mixdown.bytes()).1[0];

        let honoring = MixdownEncoder::new(store.clone(), 44100, true);
        let muted = vec![Track::new(1, "a"), Track::new(2, "b").muted()];
        let mix = honoring.mixdown(&muted).await.unwrap().unwrap();
        assert_eq!(mix.tracks(), &[1]);
        assert_eq!(first_sample(mix), f32_to_i16(0.5));

        let soloed = vec![Track::new(1, "a"), Track::new(2, "b").soloed()];
        let mix = honoring.mixdown(&soloed).await.unwrap().unwrap();
        assert_eq!(mix.tracks(), &[2]);
        assert_eq!(first_sample(mix), f32_to_i16(0.25));

        let all_muted = vec![Track::new(1, "a").muted(), Track::new(2, "b").muted()];
        assert!(honoring.mixdown(&all_muted).await.unwrap().is_none());

        let ignoring = MixdownEncoder::new(store, 44100, false);
        let mix = ignoring.mixdown(&muted).await.unwrap().unwrap();
        assert_eq!(mix.tracks(), &[1, 2]);
        assert_eq!(first_sample(mix), f32_to_i16(0.75));
    }

    #[test]
    fn test_audible_tracks() {
        let list = vec![
            Track::new(3, "c"),
            Track::new(1, "a").soloed(),
            Track::new(2, "b").soloed().muted(),
            Track::new(1, "dup").soloed(),
        ];
        assert_eq!(audible_tracks(&list, true), vec![1]);
        assert_eq!(audible_tracks(&list, false), vec![3, 1, 2]);
        assert!(audible_tracks(&[], true).is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_silence_scenario() {
        let store = store_with(&[(1, DecodedAudio::mono(vec![0.0; 26460], 44100))]);
        let encoder = MixdownEncoder::new(store, 44100, true);
        let mixdown = encoder.mixdown(&tracks(&[1])).await.unwrap().unwrap();

        let seconds = mixdown.duration().as_secs_f64();
        assert!((0.6..=1.6).contains(&seconds), "{}", seconds);
        let (_, samples) = read_samples(mixdown.bytes());
        assert!(samples.iter().all(|s| *s == 0));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mix.wav");
        mixdown.write(&path).unwrap();
        assert_eq!(fs::read(&path).unwrap(), mixdown.bytes());
    }
}
