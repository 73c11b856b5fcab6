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
use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{error, info, span, warn, Level};

use super::{
    buffer::DecodedAudio,
    mixer::AudioMixer,
    thread_priority::{
        callback_thread_priority, configure_audio_thread_priority, rt_audio_enabled,
    },
    Capture, CaptureEvent, CaptureFormat, DeviceError,
};
use crate::config::{self, audio::StreamBufferSize};

/// A device as reported by `tracklab devices`.
pub struct DeviceInfo {
    pub name: String,
    pub host: String,
    pub max_output_channels: u16,
    pub max_input_channels: u16,
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Outputs={}, Inputs={}) ({})",
            self.name, self.max_output_channels, self.max_input_channels, self.host
        )
    }
}

/// Lists cpal devices on every available host.
pub fn list_devices() -> Result<Vec<DeviceInfo>, DeviceError> {
    // Suppress noisy output here.
    let _shh_stdout = shh::stdout().map_err(|e| DeviceError::Stream(e.to_string()))?;
    let _shh_stderr = shh::stderr().map_err(|e| DeviceError::Stream(e.to_string()))?;

    let mut devices: Vec<DeviceInfo> = Vec::new();
    for host_id in cpal::available_hosts() {
        let host = match cpal::host_from_id(host_id) {
            Ok(host) => host,
            Err(e) => {
                error!(err = e.to_string(), host = host_id.name(), "Unable to open host");
                continue;
            }
        };
        let host_devices = match host.devices() {
            Ok(host_devices) => host_devices,
            Err(e) => {
                error!(
                    err = e.to_string(),
                    host = host_id.name(),
                    "Unable to list devices for host"
                );
                continue;
            }
        };

        for device in host_devices {
            let max_output_channels = device
                .supported_output_configs()
                .map(|configs| configs.map(|c| c.channels()).max().unwrap_or(0))
                .unwrap_or(0);
            let max_input_channels = device
                .supported_input_configs()
                .map(|configs| configs.map(|c| c.channels()).max().unwrap_or(0))
                .unwrap_or(0);

            if max_output_channels == 0 && max_input_channels == 0 {
                continue;
            }

            let Ok(name) = device.name() else {
                continue;
            };
            devices.push(DeviceInfo {
                name,
                host: host_id.name().to_string(),
                max_output_channels,
                max_input_channels,
            });
        }
    }

    devices.sort_by_key(|device| device.name.to_string());
    Ok(devices)
}

#[derive(Clone, Copy)]
enum Direction {
    Output,
    Input,
}

/// Finds a device by name. "default" resolves to the default host's default device.
fn find_device(name: &str, direction: Direction) -> Result<cpal::Device, DeviceError> {
    if name == config::audio::DEFAULT_DEVICE {
        let host = cpal::default_host();
        let device = match direction {
            Direction::Output => host.default_output_device(),
            Direction::Input => host.default_input_device(),
        };
        return device.ok_or_else(|| DeviceError::NotFound(name.to_string()));
    }

    for host_id in cpal::available_hosts() {
        let Ok(host) = cpal::host_from_id(host_id) else {
            continue;
        };
        let devices = match direction {
            Direction::Output => host.output_devices(),
            Direction::Input => host.input_devices(),
        };
        let Ok(devices) = devices else {
            continue;
        };

        if let Some(device) = devices
            .into_iter()
            .find(|device| device.name().is_ok_and(|n| n.trim() == name))
        {
            return Ok(device);
        }
    }

    Err(DeviceError::NotFound(name.to_string()))
}

fn cpal_buffer_size(choice: Option<StreamBufferSize>) -> cpal::BufferSize {
    match choice {
        Some(StreamBufferSize::Fixed(frames)) => cpal::BufferSize::Fixed(frames),
        Some(StreamBufferSize::Named(name)) if name == "min" => cpal::BufferSize::Fixed(64),
        _ => cpal::BufferSize::Default,
    }
}

fn build_error(err: cpal::BuildStreamError) -> DeviceError {
    match err {
        cpal::BuildStreamError::StreamConfigNotSupported => {
            DeviceError::UnsupportedFormat(err.to_string())
        }
        other => DeviceError::Stream(other.to_string()),
    }
}

/// Commands for the thread that owns an output stream.
enum StreamCommand {
    Resume,
    Suspend,
    Shutdown,
}

/// A cpal output device with a continuously running stream that renders the
/// one-shot mixer. The stream lives on its own thread because cpal streams are
/// not `Send` on every platform.
pub struct OutputDevice {
    /// The name of the device.
    name: String,
    /// The mixer rendered by the stream callback.
    mixer: AudioMixer,
    /// Whether the stream is currently paused.
    suspended: Arc<AtomicBool>,
    /// Control channel for the stream thread.
    command_tx: crossbeam_channel::Sender<StreamCommand>,
    /// Handle to the stream thread (keeps it alive).
    output_thread: Mutex<Option<thread::JoinHandle<()>>>,
}

impl OutputDevice {
    /// Opens the configured output device and starts its stream.
    pub fn get(config: &config::Audio) -> Result<OutputDevice, DeviceError> {
        let name = config.output_device().to_string();
        let device = find_device(&name, Direction::Output)?;
        let supported = device
            .default_output_config()
            .map_err(|e| DeviceError::UnsupportedFormat(e.to_string()))?;

        let stream_config = cpal::StreamConfig {
            channels: supported.channels(),
            sample_rate: cpal::SampleRate(config.sample_rate()),
            buffer_size: cpal_buffer_size(config.stream_buffer_size()),
        };
        let sample_format = supported.sample_format();
        let mixer = AudioMixer::new(stream_config.channels, config.sample_rate());

        let (command_tx, command_rx) = crossbeam_channel::unbounded();
        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);
        let output_thread = {
            let mixer = mixer.clone();
            thread::spawn(move || {
                let stream = match build_output_stream(&device, &stream_config, sample_format, mixer)
                {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                if let Err(e) = stream.play() {
                    let _ = ready_tx.send(Err(DeviceError::Stream(e.to_string())));
                    return;
                }
                let _ = ready_tx.send(Ok(()));

                while let Ok(command) = command_rx.recv() {
                    let result = match command {
                        StreamCommand::Resume => stream.play().map_err(|e| e.to_string()),
                        StreamCommand::Suspend => stream.pause().map_err(|e| e.to_string()),
                        StreamCommand::Shutdown => break,
                    };
                    if let Err(e) = result {
                        error!(err = e.to_string(), "Unable to change output stream state");
                    }
                }
            })
        };

        ready_rx
            .recv()
            .map_err(|_| DeviceError::Stream("output thread exited".to_string()))??;
        info!(
            device = name,
            channels = mixer.num_channels(),
            sample_rate = mixer.sample_rate(),
            "Output stream started"
        );

        Ok(OutputDevice {
            name,
            mixer,
            suspended: Arc::new(AtomicBool::new(false)),
            command_tx,
            output_thread: Mutex::new(Some(output_thread)),
        })
    }

    /// Pauses the stream. Playback requests fail until the device is resumed.
    pub fn suspend(&self) -> Result<(), DeviceError> {
        self.command_tx
            .send(StreamCommand::Suspend)
            .map_err(|e| DeviceError::Stream(e.to_string()))?;
        self.suspended.store(true, Ordering::Relaxed);
        Ok(())
    }
}

fn build_output_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
    mixer: AudioMixer,
) -> Result<cpal::Stream, DeviceError> {
    match sample_format {
        cpal::SampleFormat::F32 => build_typed_output_stream::<f32>(device, config, mixer),
        cpal::SampleFormat::I16 => build_typed_output_stream::<i16>(device, config, mixer),
        cpal::SampleFormat::I32 => build_typed_output_stream::<i32>(device, config, mixer),
        cpal::SampleFormat::U16 => build_typed_output_stream::<u16>(device, config, mixer),
        other => Err(DeviceError::UnsupportedFormat(format!(
            "output sample format {}",
            other
        ))),
    }
}

/// Builds a stream that renders the mixer and converts to the device format.
fn build_typed_output_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mixer: AudioMixer,
) -> Result<cpal::Stream, DeviceError>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let channels = config.channels.max(1) as usize;
    let rt_audio = rt_audio_enabled();
    let priority = callback_thread_priority();
    let mut priority_set = false;
    let mut scratch: Vec<f32> = Vec::new();

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                if let Some(priority) = priority {
                    configure_audio_thread_priority(priority, rt_audio, &mut priority_set);
                }

                // Only grows, so steady-state callbacks don't allocate.
                if scratch.len() < data.len() {
                    scratch.resize(data.len(), 0.0);
                }
                let scratch = &mut scratch[..data.len()];
                mixer.process_into_output(scratch, data.len() / channels);

                for (dst, &src) in data.iter_mut().zip(scratch.iter()) {
                    *dst = T::from_sample(src.clamp(-1.0, 1.0));
                }
            },
            |err| error!("CPAL output stream error: {}", err),
            None,
        )
        .map_err(build_error)
}

impl super::OutputDevice for OutputDevice {
    fn sample_rate(&self) -> u32 {
        self.mixer.sample_rate()
    }

    fn is_suspended(&self) -> bool {
        self.suspended.load(Ordering::Relaxed)
    }

    fn resume(&self) -> Result<(), DeviceError> {
        if !self.suspended.load(Ordering::Relaxed) {
            return Ok(());
        }
        self.command_tx
            .send(StreamCommand::Resume)
            .map_err(|e| DeviceError::Stream(e.to_string()))?;
        self.suspended.store(false, Ordering::Relaxed);
        info!(device = self.name, "Resumed output stream");
        Ok(())
    }

    fn play(&self, audio: Arc<DecodedAudio>) -> Result<(), DeviceError> {
        if self.is_suspended() {
            return Err(DeviceError::Suspended(self.name.clone()));
        }
        self.mixer.add_voice(audio);
        Ok(())
    }
}

impl Drop for OutputDevice {
    fn drop(&mut self) {
        self.mixer.clear();
        let _ = self.command_tx.send(StreamCommand::Shutdown);
        if let Some(thread) = self.output_thread.lock().take() {
            let _ = thread.join();
        }
    }
}

impl fmt::Display for OutputDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}) (Output)",
            self.name,
            self.mixer.num_channels()
        )
    }
}

/// A cpal microphone. Each capture builds its own input stream on a dedicated
/// thread and tears it down on stop.
pub struct InputDevice {
    name: String,
    device: cpal::Device,
    config: cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
}

impl InputDevice {
    /// Resolves the configured input device. Capture runs at the device's
    /// default rate; recordings are resampled when they're mixed.
    pub fn get(config: &config::Audio) -> Result<InputDevice, DeviceError> {
        let name = config.input_device().to_string();
        let device = find_device(&name, Direction::Input)?;
        let supported = device
            .default_input_config()
            .map_err(|e| DeviceError::UnsupportedFormat(e.to_string()))?;

        Ok(InputDevice {
            name,
            device,
            sample_format: supported.sample_format(),
            config: supported.config(),
        })
    }
}

impl super::InputDevice for InputDevice {
    fn open(&self, chunks: UnboundedSender<CaptureEvent>) -> Result<Box<dyn Capture>, DeviceError> {
        let span = span!(Level::INFO, "open capture (cpal)");
        let _enter = span.enter();

        let device = self.device.clone();
        let config = self.config.clone();
        let sample_format = self.sample_format;
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);

        let capture_thread = thread::spawn(move || {
            let stream = match build_input_stream(&device, &config, sample_format, chunks) {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };
            if let Err(e) = stream.play() {
                let _ = ready_tx.send(Err(DeviceError::Stream(e.to_string())));
                return;
            }
            let _ = ready_tx.send(Ok(()));

            // Either an explicit stop or the capture handle being dropped ends the stream.
            let _ = stop_rx.recv();
            drop(stream);
        });

        ready_rx
            .recv()
            .map_err(|_| DeviceError::Stream("capture thread exited".to_string()))??;
        info!(
            device = self.name,
            channels = self.config.channels,
            sample_rate = self.config.sample_rate.0,
            "Capture started"
        );

        Ok(Box::new(CpalCapture {
            format: CaptureFormat {
                channels: self.config.channels,
                sample_rate: self.config.sample_rate.0,
            },
            stop_tx,
            capture_thread: Some(capture_thread),
        }))
    }
}

fn build_input_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
    chunks: UnboundedSender<CaptureEvent>,
) -> Result<cpal::Stream, DeviceError> {
    match sample_format {
        cpal::SampleFormat::F32 => build_typed_input_stream::<f32>(device, config, chunks),
        cpal::SampleFormat::I16 => build_typed_input_stream::<i16>(device, config, chunks),
        cpal::SampleFormat::I32 => build_typed_input_stream::<i32>(device, config, chunks),
        cpal::SampleFormat::U16 => build_typed_input_stream::<u16>(device, config, chunks),
        other => Err(DeviceError::UnsupportedFormat(format!(
            "input sample format {}",
            other
        ))),
    }
}

fn build_typed_input_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    chunks: UnboundedSender<CaptureEvent>,
) -> Result<cpal::Stream, DeviceError>
where
    T: cpal::SizedSample,
    f32: cpal::FromSample<T>,
{
    let errors = chunks.clone();
    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                let chunk: Vec<f32> = data
                    .iter()
                    .map(|s| <f32 as cpal::Sample>::from_sample(*s))
                    .collect();
                let _ = chunks.send(CaptureEvent::Chunk(chunk));
            },
            move |err| {
                if let Some(message) = capture_failure(&err) {
                    error!("CPAL input stream failed: {}", message);
                    let _ = errors.send(CaptureEvent::Failed(message));
                } else {
                    warn!("CPAL input stream error: {}", err);
                }
            },
            None,
        )
        .map_err(build_error)
}

/// Only a device that has gone away ends a capture. Backend errors such as
/// overruns are reported while the stream keeps running.
fn capture_failure(err: &cpal::StreamError) -> Option<String> {
    match err {
        cpal::StreamError::DeviceNotAvailable => Some(err.to_string()),
        _ => None,
    }
}

struct CpalCapture {
    format: CaptureFormat,
    stop_tx: crossbeam_channel::Sender<()>,
    capture_thread: Option<thread::JoinHandle<()>>,
}

impl Capture for CpalCapture {
    fn format(&self) -> CaptureFormat {
        self.format
    }

    fn stop(mut self: Box<Self>) {
        let _ = self.stop_tx.send(());
        // Joining guarantees the stream, and with it the callback's sender, is gone.
        if let Some(thread) = self.capture_thread.take() {
            if thread.join().is_err() {
                warn!("Capture thread panicked");
            }
        }
    }
}

impl fmt::Display for InputDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}) (Input)",
            self.name, self.config.channels
        )
    }
}
