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

//! The ordered library of sample packs available to the pads.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// The kind of sound a sample is. Placeholders are synthesized per category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Kick,
    Snare,
    Hihat,
    OpenHat,
    Clap,
    Tom,
    Melody,
    Bass,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Kick => "kick",
            Category::Snare => "snare",
            Category::Hihat => "hihat",
            Category::OpenHat => "open-hat",
            Category::Clap => "clap",
            Category::Tom => "tom",
            Category::Melody => "melody",
            Category::Bass => "bass",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single pad sound.
#[derive(Clone, Debug, PartialEq)]
pub struct Sample {
    id: String,
    name: String,
    category: Category,
    file: Option<PathBuf>,
}

impl Sample {
    /// A sample without a backing file. It plays the category's placeholder.
    pub fn new(id: &str, name: &str, category: Category) -> Sample {
        Sample {
            id: id.to_string(),
            name: name.to_string(),
            category,
            file: None,
        }
    }

    /// Backs the sample with an audio file.
    pub fn with_file(mut self, file: &Path) -> Sample {
        self.file = Some(file.to_path_buf());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// The display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }
}

/// A named, ordered group of samples.
#[derive(Clone, Debug, PartialEq)]
pub struct SamplePack {
    id: String,
    name: String,
    description: String,
    samples: Vec<Sample>,
}

impl SamplePack {
    pub fn new(id: &str, name: &str, description: &str, samples: Vec<Sample>) -> SamplePack {
        SamplePack {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            samples,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }
}

/// The fixed set of packs for a session. Order is preserved for listing.
#[derive(Clone, Debug, PartialEq)]
pub struct Catalog {
    packs: Vec<SamplePack>,
}

impl Catalog {
    pub fn new(packs: Vec<SamplePack>) -> Catalog {
        Catalog { packs }
    }

    /// The packs that ship with tracklab.
    pub fn builtin() -> Catalog {
        use Category::*;

        Catalog::new(vec![
            SamplePack::new(
                "trap-essentials-1",
                "Trap Essentials Vol. 1",
                "Hard-hitting drums and bass for modern trap.",
                vec![
                    Sample::new("tk1", "808 Kick - \"Rumble\"", Kick),
                    Sample::new("ts1", "Snare - \"Crack\"", Snare),
                    Sample::new("th1", "Hi-hat - \"Triplet\"", Hihat),
                    Sample::new("tb1", "Bass - \"Sub Zero\"", Bass),
                ],
            ),
            SamplePack::new(
                "lofi-dreams-1",
                "Lofi Dreams Vol. 1",
                "Dusty chords and chill beats for relaxing.",
                vec![
                    Sample::new("lk1", "Kick - \"Thump\"", Kick),
                    Sample::new("ls1", "Snare - \"Brush\"", Snare),
                    Sample::new("lm1", "Melody - \"Piano Mood\"", Melody),
                    Sample::new("lm2", "Melody - \"Guitar Haze\"", Melody),
                ],
            ),
            SamplePack::new(
                "house-foundations-1",
                "House Foundations",
                "Classic four-on-the-floor rhythms.",
                vec![
                    Sample::new("hk1", "Kick - \"Deep House\"", Kick),
                    Sample::new("hh1", "Open Hat - \"Sizzle\"", Hihat),
                    Sample::new("hm1", "Melody - \"Synth Stab\"", Melody),
                    Sample::new("hb1", "Bass - \"Funky Groove\"", Bass),
                ],
            ),
        ])
    }

    pub fn packs(&self) -> &[SamplePack] {
        &self.packs
    }

    /// Every sample in catalog order.
    pub fn samples(&self) -> impl Iterator<Item = &Sample> {
        self.packs.iter().flat_map(|pack| pack.samples.iter())
    }

    pub fn sample(&self, id: &str) -> Option<&Sample> {
        self.samples().find(|sample| sample.id == id)
    }

    /// Finds the id of the first sample with the given display name.
    pub fn sample_id_by_name(&self, name: &str) -> Option<&str> {
        self.samples()
            .find(|sample| sample.name == name)
            .map(|sample| sample.id.as_str())
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Catalog::builtin()
    }
}
