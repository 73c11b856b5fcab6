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
use std::{fmt, sync::Arc};

use tokio::sync::mpsc::UnboundedSender;

use crate::config;

pub mod buffer;
pub mod cpal;
pub mod decode;
pub mod mixer;
pub mod mock;
pub mod thread_priority;
pub mod wav;

pub use buffer::DecodedAudio;

#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("permission to use audio device {0} was denied")]
    PermissionDenied(String),

    #[error("no audio device found with name {0}")]
    NotFound(String),

    #[error("audio device {0} is already in use")]
    Busy(String),

    #[error("audio device {0} is suspended")]
    Suspended(String),

    #[error("unsupported stream configuration: {0}")]
    UnsupportedFormat(String),

    #[error("audio stream error: {0}")]
    Stream(String),
}

/// An output device that one-shot buffers are played through.
pub trait OutputDevice: fmt::Display + Send + Sync {
    /// The rate buffers handed to [`OutputDevice::play`] are expected at.
    fn sample_rate(&self) -> u32;

    /// Returns true if the device has been suspended and must be resumed before
    /// anything can be heard.
    fn is_suspended(&self) -> bool;

    /// Resumes a suspended device. Resuming a running device is a no-op.
    fn resume(&self) -> Result<(), DeviceError>;

    /// Starts playing the buffer immediately, on top of whatever is already sounding.
    fn play(&self, audio: Arc<DecodedAudio>) -> Result<(), DeviceError>;
}

/// The shape of the interleaved chunks delivered by a capture.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CaptureFormat {
    pub channels: u16,
    pub sample_rate: u32,
}

/// Events delivered by an open capture.
#[derive(Debug)]
pub enum CaptureEvent {
    /// Interleaved samples in the capture's format.
    Chunk(Vec<f32>),
    /// The device failed; no further chunks will follow.
    Failed(String),
}

/// An open microphone capture.
pub trait Capture: Send {
    fn format(&self) -> CaptureFormat;

    /// Stops the capture and releases the device. Once this returns the device
    /// holds no sender for the chunk channel, so a receiver drained until it
    /// closes has seen every chunk captured before the stop.
    fn stop(self: Box<Self>);
}

/// A microphone.
pub trait InputDevice: fmt::Display + Send + Sync {
    /// Acquires the device and starts delivering chunks to `chunks`. This may block
    /// while the platform opens the device.
    fn open(&self, chunks: UnboundedSender<CaptureEvent>) -> Result<Box<dyn Capture>, DeviceError>;
}

/// Lists the devices known to cpal.
pub fn list_devices() -> Result<Vec<cpal::DeviceInfo>, DeviceError> {
    cpal::list_devices()
}

/// Gets the output device named by the configuration.
pub fn get_output_device(config: &config::Audio) -> Result<Arc<dyn OutputDevice>, DeviceError> {
    let device = config.output_device();
    if device.starts_with("mock") {
        return Ok(Arc::new(mock::OutputDevice::get(device, config.sample_rate())));
    }

    Ok(Arc::new(cpal::OutputDevice::get(config)?))
}

/// Gets the input device named by the configuration.
pub fn get_input_device(config: &config::Audio) -> Result<Arc<dyn InputDevice>, DeviceError> {
    let device = config.input_device();
    if device.starts_with("mock") {
        return Ok(Arc::new(mock::InputDevice::get(device, config.sample_rate())));
    }

    Ok(Arc::new(cpal::InputDevice::get(config)?))
}
