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

//! The sample pads.
//!
//! This module provides:
//! - The catalog of sample packs
//! - Placeholder synthesis for samples without audio files
//! - Loading of file-backed samples (in-memory for zero-latency playback)
//! - The bank that holds decoded audio for every catalog sample

mod bank;
mod catalog;
mod loader;
mod synth;

pub use bank::SampleBank;
pub use catalog::{Catalog, Category, Sample, SamplePack};
pub use loader::SampleLoader;
pub use synth::placeholder;
