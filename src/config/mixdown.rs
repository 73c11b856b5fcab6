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
use serde::Deserialize;

pub const DEFAULT_FILE_NAME: &str = "tracklab-mixdown.wav";

/// A YAML representation of the mixdown settings.
#[derive(Deserialize, Clone, Debug)]
pub struct Mixdown {
    /// Skip muted tracks, and everything but soloed tracks when any is soloed.
    #[serde(default = "default_respect_mute_solo")]
    respect_mute_solo: bool,

    /// The file exports are written to when no path is given.
    file_name: Option<String>,
}

fn default_respect_mute_solo() -> bool {
    true
}

impl Default for Mixdown {
    fn default() -> Self {
        Mixdown {
            respect_mute_solo: default_respect_mute_solo(),
            file_name: None,
        }
    }
}

impl Mixdown {
    pub fn new(respect_mute_solo: bool) -> Mixdown {
        Mixdown {
            respect_mute_solo,
            file_name: None,
        }
    }

    pub fn respect_mute_solo(&self) -> bool {
        self.respect_mute_solo
    }

    /// The default export file name.
    pub fn file_name(&self) -> &str {
        self.file_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_FILE_NAME)
    }
}
