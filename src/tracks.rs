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
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::audio::{wav, DecodedAudio};

/// A track of a project. Only the id and the mute/solo flags matter to the engine.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct Track {
    pub id: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default, alias = "isMuted")]
    pub is_muted: bool,
    #[serde(default, alias = "isSolo")]
    pub is_solo: bool,
    #[serde(default, alias = "isArmed")]
    pub is_armed: bool,
    #[serde(default, alias = "useVocalPreset")]
    pub use_vocal_preset: bool,
}

impl Track {
    pub fn new(id: u32, name: &str) -> Track {
        Track {
            id,
            name: name.to_string(),
            is_muted: false,
            is_solo: false,
            is_armed: false,
            use_vocal_preset: false,
        }
    }

    pub fn muted(mut self) -> Track {
        self.is_muted = true;
        self
    }

    pub fn soloed(mut self) -> Track {
        self.is_solo = true;
        self
    }
}

/// A finalized recording: the encoded audio plus how it was captured.
pub struct TrackRecording {
    track_id: u32,
    encoded: Vec<u8>,
    channels: u16,
    sample_rate: u32,
    frames: usize,
    chunks: usize,
}

impl TrackRecording {
    /// Encodes captured audio losslessly.
    pub fn encode(
        track_id: u32,
        audio: &DecodedAudio,
        chunks: usize,
    ) -> Result<TrackRecording, wav::WavError> {
        let encoded =
            wav::encode_float32(&audio.interleaved(), audio.channel_count(), audio.sample_rate())?;
        Ok(TrackRecording {
            track_id,
            encoded,
            channels: audio.channel_count(),
            sample_rate: audio.sample_rate(),
            frames: audio.frames(),
            chunks,
        })
    }

    /// Wraps already encoded audio (e.g. an imported file). The capture metadata
    /// is unknown until the bytes are decoded.
    pub fn from_encoded(track_id: u32, encoded: Vec<u8>) -> TrackRecording {
        TrackRecording {
            track_id,
            encoded,
            channels: 0,
            sample_rate: 0,
            frames: 0,
            chunks: 0,
        }
    }

    pub fn track_id(&self) -> u32 {
        self.track_id
    }

    /// The encoded byte stream.
    pub fn encoded(&self) -> &[u8] {
        &self.encoded
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    /// How many capture chunks went into the recording.
    pub fn chunks(&self) -> usize {
        self.chunks
    }
}

impl fmt::Debug for TrackRecording {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackRecording")
            .field("track_id", &self.track_id)
            .field("bytes", &self.encoded.len())
            .field("channels", &self.channels)
            .field("sample_rate", &self.sample_rate)
            .field("frames", &self.frames)
            .field("chunks", &self.chunks)
            .finish()
    }
}

/// The most recent recording of every track, shared between the recorder and
/// the mixdown.
#[derive(Clone, Default)]
pub struct TrackAudioStore {
    recordings: Arc<RwLock<HashMap<u32, Arc<TrackRecording>>>>,
}

impl TrackAudioStore {
    pub fn new() -> TrackAudioStore {
        TrackAudioStore::default()
    }

    /// Stores a recording, replacing any earlier one for the same track.
    pub fn insert(&self, recording: TrackRecording) -> Arc<TrackRecording> {
        let recording = Arc::new(recording);
        let replaced = self
            .recordings
            .write()
            .insert(recording.track_id(), recording.clone());
        info!(
            track = recording.track_id(),
            bytes = recording.encoded().len(),
            replaced = replaced.is_some(),
            "Stored track recording"
        );
        recording
    }

    pub fn get(&self, track_id: u32) -> Option<Arc<TrackRecording>> {
        self.recordings.read().get(&track_id).cloned()
    }

    /// A consistent copy of the current recordings.
    pub fn snapshot(&self) -> HashMap<u32, Arc<TrackRecording>> {
        self.recordings.read().clone()
    }

    pub fn len(&self) -> usize {
        self.recordings.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.recordings.read().is_empty()
    }

    /// Removes the recording of one track.
    pub fn remove(&self, track_id: u32) -> Option<Arc<TrackRecording>> {
        self.recordings.write().remove(&track_id)
    }

    pub fn clear(&self) {
        self.recordings.write().clear();
    }
}

#[cfg(test)]
mod test {
    use config::{Config, File, FileFormat};

    use super::*;
    use crate::audio::decode::decode_bytes;

    #[test]
    fn test_recording_is_lossless() {
        let audio = DecodedAudio::mono(vec![0.1, -0.2, 0.3, 1.5], 44100);
        let recording = TrackRecording::encode(7, &audio, 2).unwrap();
        assert_eq!(recording.track_id(), 7);
        assert_eq!(recording.frames(), 4);
        assert_eq!(recording.channels(), 1);
        assert_eq!(recording.chunks(), 2);

        let decoded = decode_bytes(recording.encoded().to_vec()).unwrap();
        assert_eq!(decoded, audio);
    }

    #[test]
    fn test_store_overwrites() {
        let store = TrackAudioStore::new();
        assert!(store.is_empty());

        let first = DecodedAudio::mono(vec![0.1; 10], 44100);
        let second = DecodedAudio::mono(vec![0.2; 20], 44100);
        store.insert(TrackRecording::encode(1, &first, 1).unwrap());
        let snapshot = store.snapshot();
        store.insert(TrackRecording::encode(1, &second, 1).unwrap());

        assert_eq!(store.len(), 1);
        assert_eq!(store.get(1).unwrap().frames(), 20);
        // Snapshots aren't affected by later writes.
        assert_eq!(snapshot[&1].frames(), 10);

        assert!(store.remove(1).is_some());
        assert!(store.get(1).is_none());
    }

    #[test]
    fn test_clones_share_recordings() {
        let store = TrackAudioStore::new();
        let other = store.clone();
        store.insert(TrackRecording::from_encoded(3, vec![1, 2, 3]));
        assert_eq!(other.get(3).unwrap().encoded(), &[1, 2, 3]);
        other.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn test_deserialize_tracks() {
        let yaml = r#"
            tracks:
              - id: 1
                name: Vocals
                is_muted: true
              - id: 2
                name: Guitar
                is_solo: true
                use_vocal_preset: true
        "#;

        #[derive(Deserialize)]
        struct Project {
            tracks: Vec<Track>,
        }

        let project: Project = Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(project.tracks.len(), 2);
        assert_eq!(project.tracks[0], Track::new(1, "Vocals").muted());
        assert!(project.tracks[1].is_solo);
        assert!(project.tracks[1].use_vocal_preset);
        assert!(!project.tracks[1].is_armed);
    }
}
