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
use std::collections::HashSet;
use std::path::Path;

use config::{Config, File};
use serde::{Deserialize, Serialize};

use super::error::ConfigError;
use crate::samples::{self, Category};

/// A YAML representation of a sample catalog.
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct SampleCatalog {
    /// The packs, in listing order.
    packs: Vec<SamplePack>,
}

/// A YAML representation of a sample pack.
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct SamplePack {
    id: String,
    name: String,
    #[serde(default)]
    description: String,
    samples: Vec<Sample>,
}

/// A YAML representation of a sample.
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct Sample {
    id: String,
    name: String,
    category: Category,

    /// An audio file for the sample, relative to the catalog file. Without one,
    /// the category placeholder is played.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    file: Option<String>,
}

impl SampleCatalog {
    /// Parse a catalog from a YAML file.
    pub fn deserialize(path: &Path) -> Result<SampleCatalog, ConfigError> {
        Ok(Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<SampleCatalog>()?)
    }

    /// Serializes the catalog to YAML.
    pub fn serialize(&self) -> Result<String, ConfigError> {
        Ok(serde_yml::to_string(self)?)
    }

    /// Converts a runtime catalog back to its YAML representation.
    pub fn from_catalog(catalog: &samples::Catalog) -> SampleCatalog {
        SampleCatalog {
            packs: catalog
                .packs()
                .iter()
                .map(|pack| SamplePack {
                    id: pack.id().to_string(),
                    name: pack.name().to_string(),
                    description: pack.description().to_string(),
                    samples: pack
                        .samples()
                        .iter()
                        .map(|sample| Sample {
                            id: sample.id().to_string(),
                            name: sample.name().to_string(),
                            category: sample.category(),
                            file: sample.file().map(|f| f.display().to_string()),
                        })
                        .collect(),
                })
                .collect(),
        }
    }

    /// Validates the catalog and resolves sample files against `base_path`.
    /// Sample ids must be unique across every pack.
    pub fn to_catalog(&self, base_path: &Path) -> Result<samples::Catalog, ConfigError> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut packs = Vec::with_capacity(self.packs.len());

        for pack in self.packs.iter() {
            let mut pack_samples = Vec::with_capacity(pack.samples.len());
            for sample in pack.samples.iter() {
                if sample.id.is_empty() {
                    return Err(ConfigError::InvalidCatalog(format!(
                        "sample \"{}\" in pack {} has an empty id",
                        sample.name, pack.id
                    )));
                }
                if !seen.insert(sample.id.as_str()) {
                    return Err(ConfigError::InvalidCatalog(format!(
                        "duplicate sample id {}",
                        sample.id
                    )));
                }

                let mut runtime = samples::Sample::new(&sample.id, &sample.name, sample.category);
                if let Some(file) = &sample.file {
                    let file = Path::new(file);
                    runtime = if file.is_absolute() {
                        runtime.with_file(file)
                    } else {
                        runtime.with_file(&base_path.join(file))
                    };
                }
                pack_samples.push(runtime);
            }
            packs.push(samples::SamplePack::new(
                &pack.id,
                &pack.name,
                &pack.description,
                pack_samples,
            ));
        }

        Ok(samples::Catalog::new(packs))
    }
}

/// Loads a catalog file. Relative sample files resolve against the file's directory.
pub fn load_catalog(path: &Path) -> Result<samples::Catalog, ConfigError> {
    let base_path = path.parent().unwrap_or_else(|| Path::new("."));
    SampleCatalog::deserialize(path)?.to_catalog(base_path)
}

#[cfg(test)]
mod test {
    use std::path::PathBuf;

    use config::{Config, File, FileFormat};

    use super::*;

    fn parse(yaml: &str) -> SampleCatalog {
        Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize::<SampleCatalog>()
            .unwrap()
    }

    #[test]
    fn test_parse_catalog() {
        let catalog = parse(
            r#"
            packs:
              - id: studio
                name: Studio Kit
                description: Recorded in the live room.
                samples:
                  - id: k
                    name: Kick
                    category: kick
                    file: kick.wav
                  - id: oh
                    name: Open Hat
                    category: open-hat
              - id: extra
                name: Extra
                samples:
                  - id: c
                    name: Clap
                    category: clap
                    file: /abs/clap.flac
            "#,
        )
        .to_catalog(Path::new("/kits"))
        .unwrap();

        assert_eq!(catalog.packs().len(), 2);
        assert_eq!(catalog.packs()[1].description(), "");

        let kick = catalog.sample("k").unwrap();
        assert_eq!(kick.category(), Category::Kick);
        assert_eq!(kick.file(), Some(PathBuf::from("/kits/kick.wav").as_path()));

        assert_eq!(catalog.sample("oh").unwrap().category(), Category::OpenHat);
        assert_eq!(catalog.sample("oh").unwrap().file(), None);
        assert_eq!(
            catalog.sample("c").unwrap().file(),
            Some(Path::new("/abs/clap.flac"))
        );
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let result = parse(
            r#"
            packs:
              - id: a
                name: A
                samples:
                  - {id: x, name: One, category: tom}
              - id: b
                name: B
                samples:
                  - {id: x, name: Two, category: bass}
            "#,
        )
        .to_catalog(Path::new("."));

        assert!(matches!(result, Err(ConfigError::InvalidCatalog(_))));
    }

    #[test]
    fn test_builtin_catalog_survives_yaml() {
        let builtin = samples::Catalog::builtin();
        let yaml = SampleCatalog::from_catalog(&builtin).serialize().unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.yaml");
        std::fs::write(&path, yaml).unwrap();

        assert_eq!(load_catalog(&path).unwrap(), builtin);
    }
}
