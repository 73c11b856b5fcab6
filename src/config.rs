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
use std::path::{Path, PathBuf};

use config::{builder::DefaultState, Config, ConfigBuilder, Environment, File};
use serde::Deserialize;
use tracing::info;

use crate::samples;

pub mod audio;
pub mod catalog;
pub mod error;
pub mod mixdown;

pub use self::audio::Audio;
pub use self::error::ConfigError;
pub use self::mixdown::Mixdown;

/// Environment variables with this prefix override file settings, with `__`
/// between nested keys (e.g. TRACKLAB_AUDIO__SAMPLE_RATE=48000).
pub const ENV_PREFIX: &str = "TRACKLAB";

/// The engine configuration.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct EngineConfig {
    /// The audio devices and working rate.
    #[serde(default)]
    audio: Audio,

    /// A sample catalog file. The built-in packs are used when absent.
    catalog: Option<PathBuf>,

    /// Mixdown settings.
    #[serde(default)]
    mixdown: Mixdown,

    /// The directory of the file this was loaded from.
    #[serde(skip)]
    base_path: Option<PathBuf>,
}

impl EngineConfig {
    /// Creates a new engine configuration.
    pub fn new(audio: Audio, mixdown: Mixdown) -> EngineConfig {
        EngineConfig {
            audio,
            catalog: None,
            mixdown,
            base_path: None,
        }
    }

    /// Parses the configuration from a YAML file, applying environment overrides.
    pub fn deserialize(path: &Path) -> Result<EngineConfig, ConfigError> {
        let mut config = Self::build(Config::builder().add_source(File::from(path)))?;
        config.base_path = path.parent().map(Path::to_path_buf);
        info!(path = ?path, "Loaded engine configuration");
        Ok(config)
    }

    /// Loads from the given file, or from the environment alone.
    pub fn load(path: Option<&Path>) -> Result<EngineConfig, ConfigError> {
        match path {
            Some(path) => Self::deserialize(path),
            None => Self::build(Config::builder()),
        }
    }

    fn build(builder: ConfigBuilder<DefaultState>) -> Result<EngineConfig, ConfigError> {
        Ok(builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize::<EngineConfig>()?)
    }

    pub fn audio(&self) -> &Audio {
        &self.audio
    }

    pub fn mixdown(&self) -> &Mixdown {
        &self.mixdown
    }

    /// Sets the catalog file.
    pub fn with_catalog(mut self, catalog: &Path) -> EngineConfig {
        self.catalog = Some(catalog.to_path_buf());
        self
    }

    /// The catalog file, resolved against the configuration file's directory.
    pub fn catalog_path(&self) -> Option<PathBuf> {
        self.catalog.as_ref().map(|catalog| match &self.base_path {
            Some(base) if catalog.is_relative() => base.join(catalog),
            _ => catalog.clone(),
        })
    }

    /// Loads the configured catalog, or the built-in packs.
    pub fn catalog(&self) -> Result<samples::Catalog, ConfigError> {
        match self.catalog_path() {
            Some(path) => catalog::load_catalog(&path),
            None => Ok(samples::Catalog::builtin()),
        }
    }
}
