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

//! Loading of file-backed samples.
//!
//! Samples are decoded entirely into memory at startup and brought to the
//! bank's working rate, so playback never touches the disk.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::audio::decode::{decode_file, DecodeError};
use crate::audio::DecodedAudio;

/// Decodes sample files, caching them by path.
pub struct SampleLoader {
    /// Cache of loaded samples by file path.
    cache: HashMap<PathBuf, Arc<DecodedAudio>>,
    /// Target sample rate (matches audio output).
    target_sample_rate: u32,
}

impl SampleLoader {
    /// Creates a new sample loader.
    pub fn new(target_sample_rate: u32) -> Self {
        Self {
            cache: HashMap::new(),
            target_sample_rate,
        }
    }

    /// Loads a sample file into memory, returning the cached copy if the same
    /// path has been loaded before.
    pub fn load(&mut self, path: &Path) -> Result<Arc<DecodedAudio>, DecodeError> {
        if let Some(sample) = self.cache.get(path) {
            debug!(path = ?path, "Using cached sample");
            return Ok(sample.clone());
        }

        info!(path = ?path, "Loading sample into memory");
        let decoded = decode_file(path)?;
        let source_rate = decoded.sample_rate();

        let decoded = if source_rate != self.target_sample_rate {
            info!(
                source_rate,
                target_rate = self.target_sample_rate,
                "Transcoding sample"
            );
            decoded.resampled(self.target_sample_rate)
        } else {
            decoded
        };

        info!(
            path = ?path,
            channels = decoded.channel_count(),
            sample_rate = decoded.sample_rate(),
            duration_ms = decoded.duration().as_millis(),
            memory_kb = decoded.memory_size() / 1024,
            "Sample loaded"
        );

        let loaded = Arc::new(decoded);
        self.cache.insert(path.to_path_buf(), loaded.clone());
        Ok(loaded)
    }

    /// Returns the total memory used by cached samples.
    pub fn total_memory_usage(&self) -> usize {
        self.cache.values().map(|s| s.memory_size()).sum()
    }
}
