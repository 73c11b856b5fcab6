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
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, span, Level};

use crate::audio::{self, DeviceError, InputDevice, OutputDevice};
use crate::config::{ConfigError, EngineConfig};
use crate::mixdown::{Mixdown, MixdownEncoder, MixdownError};
use crate::playback::PlaybackEngine;
use crate::recorder::{Recorder, RecorderError, RecordingHandle};
use crate::samples::{Catalog, SampleBank};
use crate::tracks::{Track, TrackAudioStore, TrackRecording};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error("unable to import {}: {source}", .path.display())]
    Import {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Owns the devices, the sample bank, the recorder, the track audio store and
/// the mixdown for one session. Devices are released by [`Engine::shutdown`].
pub struct Engine {
    config: EngineConfig,
    bank: Arc<SampleBank>,
    store: TrackAudioStore,
    playback: PlaybackEngine,
    recorder: Recorder,
    mixdown: MixdownEncoder,
}

impl Engine {
    /// Opens the configured devices and loads the sample bank.
    pub fn new(config: EngineConfig) -> Result<Engine, EngineError> {
        let span = span!(Level::INFO, "engine");
        let _enter = span.enter();

        let catalog = config.catalog()?;
        let output = audio::get_output_device(config.audio())?;
        let input = audio::get_input_device(config.audio())?;
        info!(output = %output, input = %input, "Opened audio devices");

        Ok(Engine::with_devices(config, catalog, output, input))
    }

    /// Builds an engine around already opened devices and loads the sample bank.
    pub fn with_devices(
        config: EngineConfig,
        catalog: Catalog,
        output: Arc<dyn OutputDevice>,
        input: Arc<dyn InputDevice>,
    ) -> Engine {
        let sample_rate = config.audio().sample_rate();
        let bank = Arc::new(SampleBank::new(catalog, sample_rate));
        bank.load();

        let store = TrackAudioStore::new();
        Engine {
            playback: PlaybackEngine::new(output, bank.clone()),
            recorder: Recorder::new(input, store.clone()),
            mixdown: MixdownEncoder::new(
                store.clone(),
                sample_rate,
                config.mixdown().respect_mute_solo(),
            ),
            config,
            bank,
            store,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn bank(&self) -> &SampleBank {
        &self.bank
    }

    pub fn catalog(&self) -> &Catalog {
        self.bank.catalog()
    }

    pub fn store(&self) -> &TrackAudioStore {
        &self.store
    }

    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    /// Plays a sample pad. Fire-and-forget.
    pub fn play(&self, sample_id: &str) {
        self.playback.play(sample_id);
    }

    /// Plays the sample with the given display name.
    pub fn play_by_name(&self, name: &str) -> bool {
        match self.catalog().sample_id_by_name(name) {
            Some(id) => {
                self.playback.play(id);
                true
            }
            None => false,
        }
    }

    pub async fn start_recording(&self, track_id: u32) -> bool {
        self.recorder.start_recording(track_id).await
    }

    pub async fn stop_recording(&self, track_id: u32) -> Result<RecordingHandle, RecorderError> {
        self.recorder.stop_recording(track_id).await
    }

    /// Stores an audio file as the recording of a track. The file is decoded
    /// when it is mixed.
    pub fn import(&self, track_id: u32, path: &Path) -> Result<Arc<TrackRecording>, EngineError> {
        let bytes = fs::read(path).map_err(|source| EngineError::Import {
            path: path.to_path_buf(),
            source,
        })?;
        info!(track = track_id, path = ?path, "Imported track audio");
        Ok(self
            .store
            .insert(TrackRecording::from_encoded(track_id, bytes)))
    }

    pub async fn mixdown(&self, tracks: &[Track]) -> Result<Option<Mixdown>, MixdownError> {
        self.mixdown.mixdown(tracks).await
    }

    /// Mixes the tracks down and writes the WAV to `path`, or to the configured
    /// file name. Returns the path written, or `None` if there was nothing to export.
    pub async fn export(
        &self,
        tracks: &[Track],
        path: Option<&Path>,
    ) -> Result<Option<PathBuf>, MixdownError> {
        let Some(mixdown) = self.mixdown(tracks).await? else {
            return Ok(None);
        };

        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(self.config.mixdown().file_name()));
        mixdown.write(&path)?;
        Ok(Some(path))
    }

    /// Abandons any recording in flight and releases the devices.
    pub async fn shutdown(self) {
        self.recorder.shutdown().await;
        drop(self.playback);
        info!("Engine shut down");
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::audio::mock;
    use crate::config::{Audio, Mixdown as MixdownConfig};

    fn engine() -> (Engine, mock::OutputDevice, mock::InputDevice) {
        let config = EngineConfig::new(Audio::new("mock", "mock"), MixdownConfig::new(true));
        let output = mock::OutputDevice::get("mock-suspended", 44100);
        let input = mock::InputDevice::get("mock-mic", 44100);
        let engine = Engine::with_devices(
            config,
            Catalog::builtin(),
            Arc::new(output.clone()),
            Arc::new(input.clone()),
        );
        (engine, output, input)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_record_and_export() {
        let (engine, output, input) = engine();
        assert_eq!(engine.bank().len(), 12);

        // Playback and recording don't get in each other's way.
        assert!(engine.start_recording(1).await);
        engine.play("tk1");
        assert!(engine.play_by_name("Snare - \"Crack\""));
        assert!(!engine.play_by_name("Cowbell"));
        assert_eq!(output.played().len(), 2);

        for _ in 0..3 {
            assert!(input.inject(vec![0.0; 8820]));
        }
        let handle = engine.stop_recording(1).await.unwrap();
        assert!((handle.duration().as_secs_f64() - 0.6).abs() < 1e-6);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mix.wav");
        let written = engine
            .export(&[Track::new(1, "Vocals")], Some(&path))
            .await
            .unwrap();
        assert_eq!(written, Some(path.clone()));

        let reader = hound::WavReader::open(&path).unwrap();
        let seconds = reader.duration() as f64 / reader.spec().sample_rate as f64;
        assert!((0.6..=1.6).contains(&seconds));
        assert!(reader
            .into_samples::<i16>()
            .all(|s| s.unwrap() == 0));

        engine.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_export_nothing() {
        let (engine, _output, _input) = engine();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mix.wav");

        assert_eq!(engine.export(&[Track::new(1, "a")], Some(&path)).await.unwrap(), None);
        assert!(!path.exists());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_import_and_mix() {
        let (engine, _output, _input) = engine();
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("one.wav");
        let second = dir.path().join("two.wav");
        crate::testutil::write_wav(first.clone(), vec![vec![0.25f32; 4410]], 44100).unwrap();
        crate::testutil::write_wav(second.clone(), vec![vec![8192i16; 2205]], 22050).unwrap();

        engine.import(1, &first).unwrap();
        engine.import(2, &second).unwrap();
        assert!(matches!(
            engine.import(3, &dir.path().join("missing.wav")),
            Err(EngineError::Import { .. })
        ));

        let mixdown = engine
            .mixdown(&[Track::new(1, "a"), Track::new(2, "b")])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(mixdown.frames(), 4410 + 44100);
        assert_eq!(mixdown.tracks(), &[1, 2]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_shutdown_releases_input() {
        let (engine, _output, input) = engine();
        assert!(engine.start_recording(2).await);
        assert!(input.is_capturing());

        engine.shutdown().await;
        assert!(!input.is_capturing());
    }

    #[test]
    fn test_new_with_mock_devices() {
        let config = EngineConfig::new(
            Audio::new("mock-out", "mock-in").with_sample_rate(48000),
            MixdownConfig::default(),
        );
        let engine = Engine::new(config).unwrap();
        assert_eq!(engine.bank().sample_rate(), 48000);
        assert_eq!(engine.catalog(), &Catalog::builtin());
    }
}
