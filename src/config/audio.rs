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

pub const DEFAULT_DEVICE: &str = "default";
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

/// How to choose the CPAL stream buffer size (period size). Affects latency vs underrun tolerance.
#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum StreamBufferSize {
    /// A named choice: "default" (backend default) or "min" (lowest latency).
    Named(String),
    /// Use a fixed size in frames.
    Fixed(u32),
}

/// A YAML representation of the audio configuration.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Audio {
    /// The output device pads are played through. "default" picks the host default.
    output_device: Option<String>,

    /// The microphone recordings are captured from. "default" picks the host default.
    input_device: Option<String>,

    /// Working sample rate in Hz (default: 44100). Samples, recordings and
    /// mixdowns are all brought to this rate.
    sample_rate: Option<u32>,

    /// CPAL stream buffer: "default", "min" or a number of frames.
    stream_buffer_size: Option<StreamBufferSize>,
}

impl Audio {
    /// New will create a new Audio configuration.
    pub fn new(output_device: &str, input_device: &str) -> Audio {
        Audio {
            output_device: Some(output_device.to_string()),
            input_device: Some(input_device.to_string()),
            sample_rate: None,
            stream_buffer_size: None,
        }
    }

    /// Sets the working sample rate.
    pub fn with_sample_rate(mut self, sample_rate: u32) -> Audio {
        self.sample_rate = Some(sample_rate);
        self
    }

    /// Returns the output device from the configuration.
    pub fn output_device(&self) -> &str {
        self.output_device.as_deref().unwrap_or(DEFAULT_DEVICE)
    }

    /// Returns the input device from the configuration.
    pub fn input_device(&self) -> &str {
        self.input_device.as_deref().unwrap_or(DEFAULT_DEVICE)
    }

    /// Returns the working sample rate (default: 44100)
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
            .filter(|rate| *rate > 0)
            .unwrap_or(DEFAULT_SAMPLE_RATE)
    }

    /// Returns the stream buffer size choice for CPAL. None means backend default.
    pub fn stream_buffer_size(&self) -> Option<StreamBufferSize> {
        self.stream_buffer_size.clone()
    }
}
