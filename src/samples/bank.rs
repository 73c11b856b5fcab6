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
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{info, span, warn, Level};

use super::catalog::Catalog;
use super::loader::SampleLoader;
use super::synth::placeholder;
use crate::audio::DecodedAudio;

/// Decoded audio for every sample in a catalog, keyed by sample id.
pub struct SampleBank {
    catalog: Catalog,
    sample_rate: u32,
    samples: RwLock<HashMap<String, Arc<DecodedAudio>>>,
}

impl SampleBank {
    /// Creates an empty bank. Nothing is decoded until [`SampleBank::load`].
    pub fn new(catalog: Catalog, sample_rate: u32) -> SampleBank {
        SampleBank {
            catalog,
            sample_rate,
            samples: RwLock::new(HashMap::new()),
        }
    }

    /// Populates every catalog sample that isn't loaded yet. Samples with files
    /// are decoded from disk; anything else, including files that fail to load,
    /// gets its category placeholder. Calling this again is a no-op.
    pub fn load(&self) {
        let span = span!(Level::INFO, "load samples");
        let _enter = span.enter();

        let missing: Vec<_> = {
            let samples = self.samples.read();
            self.catalog
                .samples()
                .filter(|sample| !samples.contains_key(sample.id()))
                .collect()
        };
        if missing.is_empty() {
            return;
        }

        let mut loader = SampleLoader::new(self.sample_rate);
        let mut loaded = Vec::with_capacity(missing.len());
        for sample in missing {
            let audio = match sample.file() {
                Some(path) => match loader.load(path) {
                    Ok(audio) => audio,
                    Err(e) => {
                        warn!(
                            sample = sample.id(),
                            path = ?path,
                            err = e.to_string(),
                            "Unable to load sample file, using placeholder"
                        );
                        Arc::new(placeholder(sample.category(), self.sample_rate))
                    }
                },
                None => Arc::new(placeholder(sample.category(), self.sample_rate)),
            };
            loaded.push((sample.id().to_string(), audio));
        }

        let mut samples = self.samples.write();
        for (id, audio) in loaded {
            samples.entry(id).or_insert(audio);
        }
        info!(
            samples = samples.len(),
            sample_rate = self.sample_rate,
            memory_kb = samples.values().map(|s| s.memory_size()).sum::<usize>() / 1024,
            "Samples loaded"
        );
    }

    /// Gets the decoded audio for a sample. Unknown or unloaded ids are logged.
    pub fn get(&self, sample_id: &str) -> Option<Arc<DecodedAudio>> {
        let sample = self.samples.read().get(sample_id).cloned();
        if sample.is_none() {
            warn!(sample = sample_id, "Sample not found");
        }
        sample
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// The number of loaded samples.
    pub fn len(&self) -> usize {
        self.samples.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.read().is_empty()
    }
}

#[cfg(test)]
mod test {
    use std::path::Path;

    use super::*;
    use crate::samples::catalog::{Category, Sample, SamplePack};
    use crate::testutil::write_wav;

    #[test]
    fn test_load_populates_every_sample() {
        let bank = SampleBank::new(Catalog::builtin(), 44100);
        assert!(bank.is_empty());
        assert!(bank.get("tk1").is_none());

        bank.load();
        assert_eq!(bank.len(), 12);
        for sample in Catalog::builtin().samples() {
            let audio = bank.get(sample.id()).unwrap();
            assert_eq!(audio.sample_rate(), 44100);
            assert_eq!(audio.channel_count(), 1);
        }
        assert_eq!(bank.get("tk1").unwrap().frames(), 6615);
    }

    #[test]
    fn test_load_is_idempotent() {
        let bank = SampleBank::new(Catalog::builtin(), 48000);
        bank.load();
        let first: Vec<_> = bank
            .catalog()
            .samples()
            .map(|s| bank.get(s.id()).unwrap())
            .collect();

        bank.load();
        for (sample, before) in bank.catalog().samples().zip(first.iter()) {
            let after = bank.get(sample.id()).unwrap();
            assert!(Arc::ptr_eq(before, &after));
            assert_eq!(**before, *after);
        }

        // A separate bank, loaded independently, holds the same audio.
        let other = SampleBank::new(Catalog::builtin(), 48000);
        other.load();
        for (sample, before) in bank.catalog().samples().zip(first.iter()) {
            assert_eq!(**before, *other.get(sample.id()).unwrap());
        }
    }

    #[test]
    fn test_unknown_sample() {
        let bank = SampleBank::new(Catalog::builtin(), 44100);
        bank.load();
        assert!(bank.get("does-not-exist").is_none());
    }

    #[test]
    fn test_file_backed_samples() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kick.wav");
        write_wav(path.clone(), vec![vec![0.5f32; 441], vec![-0.5f32; 441]], 44100).unwrap();

        let catalog = Catalog::new(vec![SamplePack::new(
            "studio",
            "Studio",
            "",
            vec![
                Sample::new("k", "Kick", Category::Kick).with_file(&path),
                Sample::new("broken", "Broken", Category::Tom)
                    .with_file(Path::new("/nonexistent/tom.wav")),
            ],
        )]);
        let bank = SampleBank::new(catalog, 44100);
        bank.load();

        let kick = bank.get("k").unwrap();
        assert_eq!(kick.channel_count(), 2);
        assert_eq!(kick.frames(), 441);
        assert_eq!(kick.channel(1).unwrap()[0], -0.5);

        // Falls back to the silent tom placeholder.
        let broken = bank.get("broken").unwrap();
        assert_eq!(broken.frames(), 4410);
        assert!(broken.channel(0).unwrap().iter().all(|s| *s == 0.0));
    }
}
