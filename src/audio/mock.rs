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
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
};

use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedSender;
use tracing::info;

use super::{
    buffer::DecodedAudio, mixer::AudioMixer, Capture, CaptureEvent, CaptureFormat, DeviceError,
};

/// A mock output device. Doesn't actually play anything, but keeps a mixer that
/// tests can render to see what would have been heard.
#[derive(Clone)]
pub struct OutputDevice {
    name: String,
    mixer: AudioMixer,
    suspended: Arc<AtomicBool>,
    resume_count: Arc<AtomicUsize>,
    played: Arc<Mutex<Vec<Arc<DecodedAudio>>>>,
}

impl OutputDevice {
    /// Gets the given mock output device.
    pub fn get(name: &str, sample_rate: u32) -> OutputDevice {
        OutputDevice {
            name: name.to_string(),
            mixer: AudioMixer::new(2, sample_rate),
            suspended: Arc::new(AtomicBool::new(name.contains("suspended"))),
            resume_count: Arc::new(AtomicUsize::new(0)),
            played: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Puts the device into the suspended state.
    pub fn suspend(&self) {
        self.suspended.store(true, Ordering::Relaxed);
    }

    /// Returns how many times the device has been resumed.
    pub fn resume_count(&self) -> usize {
        self.resume_count.load(Ordering::Relaxed)
    }

    /// Returns every buffer handed to the device so far.
    pub fn played(&self) -> Vec<Arc<DecodedAudio>> {
        self.played.lock().clone()
    }

    /// Renders frames from the device's mixer.
    pub fn render(&self, num_frames: usize) -> Vec<f32> {
        self.mixer.process_frames(num_frames)
    }
}

impl super::OutputDevice for OutputDevice {
    fn sample_rate(&self) -> u32 {
        self.mixer.sample_rate()
    }

    fn is_suspended(&self) -> bool {
        self.suspended.load(Ordering::Relaxed)
    }

    fn resume(&self) -> Result<(), DeviceError> {
        if self.suspended.swap(false, Ordering::Relaxed) {
            self.resume_count.fetch_add(1, Ordering::Relaxed);
            info!(device = self.name, "Resumed output device.");
        }
        Ok(())
    }

    fn play(&self, audio: Arc<DecodedAudio>) -> Result<(), DeviceError> {
        if self.is_suspended() {
            return Err(DeviceError::Suspended(self.name.clone()));
        }
        self.played.lock().push(audio.clone());
        self.mixer.add_voice(audio);
        Ok(())
    }
}

impl fmt::Display for OutputDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name)
    }
}

/// Holds callers at a point until the test lets them through.
#[derive(Clone, Default)]
struct Gate(Arc<Mutex<Option<crossbeam_channel::Receiver<()>>>>);

impl Gate {
    /// Closes the gate. It opens again once the returned handle is dropped.
    fn close(&self) -> crossbeam_channel::Sender<()> {
        let (tx, rx) = crossbeam_channel::bounded(0);
        *self.0.lock() = Some(rx);
        tx
    }

    fn wait(&self) {
        let rx = self.0.lock().clone();
        if let Some(rx) = rx {
            // Returns once every handle is gone.
            while rx.recv().is_ok() {}
        }
    }
}

/// The sender of the open capture, tagged with the open it belongs to.
type CaptureSlot = Arc<Mutex<Option<(usize, UnboundedSender<CaptureEvent>)>>>;

/// A mock microphone. Captured chunks are injected by the test through
/// [`InputDevice::inject`] while a capture is open.
#[derive(Clone)]
pub struct InputDevice {
    name: String,
    format: CaptureFormat,
    denied: Arc<AtomicBool>,
    slot: CaptureSlot,
    open_count: Arc<AtomicUsize>,
    opens_started: Arc<AtomicUsize>,
    open_gate: Gate,
    stop_gate: Gate,
}

impl InputDevice {
    /// Gets the given mock input device.
    pub fn get(name: &str, sample_rate: u32) -> InputDevice {
        InputDevice {
            name: name.to_string(),
            format: CaptureFormat {
                channels: 1,
                sample_rate,
            },
            denied: Arc::new(AtomicBool::new(name.contains("denied"))),
            slot: Arc::new(Mutex::new(None)),
            open_count: Arc::new(AtomicUsize::new(0)),
            opens_started: Arc::new(AtomicUsize::new(0)),
            open_gate: Gate::default(),
            stop_gate: Gate::default(),
        }
    }

    /// Makes the next opens fail as if the user refused microphone access.
    pub fn set_denied(&self, denied: bool) {
        self.denied.store(denied, Ordering::Relaxed);
    }

    /// Makes opens block, as a slow permission prompt would, until the returned
    /// handle is dropped.
    pub fn hold_opens(&self) -> crossbeam_channel::Sender<()> {
        self.open_gate.close()
    }

    /// Makes capture stops block, as a device flushing its buffers would, until
    /// the returned handle is dropped.
    pub fn hold_stops(&self) -> crossbeam_channel::Sender<()> {
        self.stop_gate.close()
    }

    /// Returns true while a capture is open.
    pub fn is_capturing(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// Returns how many captures have been opened successfully.
    pub fn open_count(&self) -> usize {
        self.open_count.load(Ordering::Relaxed)
    }

    /// Returns how many opens have been attempted, including ones still blocked.
    pub fn opens_started(&self) -> usize {
        self.opens_started.load(Ordering::Relaxed)
    }

    /// Delivers a chunk of interleaved samples to the open capture. Returns false
    /// if nothing is capturing.
    pub fn inject(&self, chunk: Vec<f32>) -> bool {
        match self.slot.lock().as_ref() {
            Some((_, sender)) => sender.send(CaptureEvent::Chunk(chunk)).is_ok(),
            None => false,
        }
    }

    /// Simulates a fatal device error on the open capture. The device is gone
    /// afterwards, just like a pulled USB microphone.
    pub fn fail(&self, message: &str) -> bool {
        match self.slot.lock().take() {
            Some((_, sender)) => sender
                .send(CaptureEvent::Failed(message.to_string()))
                .is_ok(),
            None => false,
        }
    }
}

struct MockCapture {
    format: CaptureFormat,
    token: usize,
    slot: CaptureSlot,
    stop_gate: Gate,
}

impl Capture for MockCapture {
    fn format(&self) -> CaptureFormat {
        self.format
    }

    fn stop(self: Box<Self>) {
        self.stop_gate.wait();

        // Dropping the sender closes the chunk channel once it has been drained.
        // A capture opened after this one failed keeps its sender.
        let mut slot = self.slot.lock();
        if slot.as_ref().is_some_and(|(token, _)| *token == self.token) {
            slot.take();
        }
    }
}

impl super::InputDevice for InputDevice {
    fn open(&self, chunks: UnboundedSender<CaptureEvent>) -> Result<Box<dyn Capture>, DeviceError> {
        self.opens_started.fetch_add(1, Ordering::Relaxed);
        self.open_gate.wait();

        if self.denied.load(Ordering::Relaxed) {
            return Err(DeviceError::PermissionDenied(self.name.clone()));
        }

        let mut slot = self.slot.lock();
        if slot.is_some() {
            return Err(DeviceError::Busy(self.name.clone()));
        }
        let token = self.open_count.fetch_add(1, Ordering::Relaxed) + 1;
        *slot = Some((token, chunks));
        info!(device = self.name, "Opened mock capture.");

        Ok(Box::new(MockCapture {
            format: self.format,
            token,
            slot: self.slot.clone(),
            stop_gate: self.stop_gate.clone(),
        }))
    }
}

impl fmt::Display for InputDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name)
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;
    use crate::audio::{InputDevice as _, OutputDevice as _};

    #[test]
    fn test_suspended_output_rejects_play_until_resumed() {
        let device = OutputDevice::get("mock-suspended", 44100);
        assert!(device.is_suspended());

        let audio = Arc::new(DecodedAudio::mono(vec![0.5], 44100));
        assert!(matches!(
            device.play(audio.clone()),
            Err(DeviceError::Suspended(_))
        ));

        device.resume().unwrap();
        assert!(!device.is_suspended());
        assert_eq!(device.resume_count(), 1);
        device.play(audio).unwrap();
        assert_eq!(device.render(1), vec![0.5, 0.5]);
    }

    #[test]
    fn test_input_injects_until_stopped() {
        let device = InputDevice::get("mock-mic", 44100);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let capture = device.open(tx).unwrap();
        assert!(device.is_capturing());
        assert!(device.inject(vec![0.1, 0.2]));

        capture.stop();
        assert!(!device.is_capturing());
        assert!(!device.inject(vec![0.3]));

        assert!(matches!(rx.try_recv(), Ok(CaptureEvent::Chunk(c)) if c == vec![0.1, 0.2]));
        assert!(matches!(
            rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }

    #[test]
    fn test_stale_capture_stop_keeps_newer_capture() {
        let device = InputDevice::get("mock-mic", 44100);
        let (first_tx, _first_rx) = mpsc::unbounded_channel();
        let first = device.open(first_tx).unwrap();
        assert!(device.fail("unplugged"));
        assert!(!device.is_capturing());

        let (second_tx, mut second_rx) = mpsc::unbounded_channel();
        let second = device.open(second_tx).unwrap();

        // Stopping the failed capture late doesn't touch the new one.
        first.stop();
        assert!(device.is_capturing());
        assert!(device.inject(vec![0.5]));
        assert!(matches!(second_rx.try_recv(), Ok(CaptureEvent::Chunk(c)) if c == vec![0.5]));

        second.stop();
        assert!(!device.is_capturing());
    }

    #[test]
    fn test_held_open_waits_for_release() {
        let device = InputDevice::get("mock-mic", 44100);
        let release = device.hold_opens();

        let opener = {
            let device = device.clone();
            std::thread::spawn(move || {
                let (tx, _rx) = mpsc::unbounded_channel();
                device.open(tx).map(|capture| capture.stop()).is_ok()
            })
        };
        while device.opens_started() == 0 {
            std::thread::yield_now();
        }
        assert_eq!(device.open_count(), 0);

        drop(release);
        assert!(opener.join().unwrap());
        assert_eq!(device.open_count(), 1);
    }

    #[test]
    fn test_input_denied() {
        let device = InputDevice::get("mock-mic", 44100);
        device.set_denied(true);
        let (tx, _rx) = mpsc::unbounded_channel();
        assert!(matches!(
            device.open(tx),
            Err(DeviceError::PermissionDenied(_))
        ));
        assert_eq!(device.open_count(), 0);
    }
}
