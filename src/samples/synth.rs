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

//! Placeholder sounds for samples without audio files.
//!
//! Every placeholder is mono and a pure function of its category and sample
//! rate. Noise is drawn from a generator seeded by the category, so two banks
//! built in any order hold identical buffers.

use std::f32::consts::PI;

use rand::{rngs::StdRng, Rng, SeedableRng};

use super::catalog::Category;
use crate::audio::DecodedAudio;

const KICK_SECONDS: f64 = 0.15;
const DEFAULT_SECONDS: f64 = 0.1;

/// Length of the placeholder for the category.
fn duration_seconds(category: Category) -> f64 {
    match category {
        Category::Kick => KICK_SECONDS,
        _ => DEFAULT_SECONDS,
    }
}

/// FNV-1a over the category name.
fn seed(category: Category) -> u64 {
    category
        .as_str()
        .bytes()
        .fold(0xcbf29ce484222325u64, |hash, byte| {
            (hash ^ byte as u64).wrapping_mul(0x100000001b3)
        })
}

/// Synthesizes the placeholder for the category at the given rate.
pub fn placeholder(category: Category, sample_rate: u32) -> DecodedAudio {
    let frames = (sample_rate as f64 * duration_seconds(category)).round() as usize;
    let mut rng = StdRng::seed_from_u64(seed(category));
    let mut noise = move || rng.gen_range(-1.0f32..1.0f32);

    let samples: Vec<f32> = match category {
        Category::Kick => (0..frames)
            .map(|i| {
                let t = i as f32 / frames as f32;
                let freq = 120.0 * (-t * 25.0).exp();
                (2.0 * PI * freq * t).sin() * (-t * 10.0).exp()
            })
            .collect(),
        Category::Snare | Category::Clap => (0..frames)
            .map(|i| {
                let t = i as f32 / frames as f32;
                noise() * (-t * 20.0).exp()
            })
            .collect(),
        // Gated noise: the second half is silent.
        Category::Hihat | Category::OpenHat => (0..frames)
            .map(|i| {
                let sample = noise();
                if i as f32 / frames as f32 > 0.5 {
                    0.0
                } else {
                    sample
                }
            })
            .collect(),
        Category::Melody | Category::Bass | Category::Tom => vec![0.0; frames],
    };

    DecodedAudio::mono(samples, sample_rate)
}
