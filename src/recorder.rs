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

//! Microphone recording, one track at a time.
//!
//! A session moves through `Idle -> Opening -> Capturing -> Finalizing -> Idle`.
//! Only one session exists system-wide; a start while any session is in flight
//! is rejected without touching it. Chunks flow from the device callback into
//! an unbounded channel drained by a collector task. Stopping the device drops
//! the last sender, so the collector ends only after it has seen every chunk
//! captured before the stop.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::task::JoinHandle;
use tracing::{error, info, span, warn, Instrument, Level};

use crate::audio::{wav::WavError, Capture, CaptureEvent, CaptureFormat, DecodedAudio, InputDevice};
use crate::tracks::{TrackAudioStore, TrackRecording};

/// Where the recorder is in a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecorderState {
    Idle,
    /// The microphone is being acquired.
    Opening { track_id: u32 },
    Capturing { track_id: u32 },
    /// The device is flushing and the capture is being encoded.
    Finalizing { track_id: u32 },
}

impl RecorderState {
    /// The track of the session in flight, if any.
    pub fn track_id(&self) -> Option<u32> {
        match self {
            RecorderState::Idle => None,
            RecorderState::Opening { track_id }
            | RecorderState::Capturing { track_id }
            | RecorderState::Finalizing { track_id } => Some(*track_id),
        }
    }
}

impl fmt::Display for RecorderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecorderState::Idle => write!(f, "idle"),
            RecorderState::Opening { track_id } => write!(f, "opening (track {})", track_id),
            RecorderState::Capturing { track_id } => write!(f, "capturing (track {})", track_id),
            RecorderState::Finalizing { track_id } => {
                write!(f, "finalizing (track {})", track_id)
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RecorderError {
    #[error("track {track_id} is not being recorded (recorder is {state})")]
    NotRecording { track_id: u32, state: RecorderState },

    #[error("recording for track {0} captured no audio")]
    EmptyRecording(u32),

    #[error("input device failed while recording track {track_id}: {message}")]
    Device { track_id: u32, message: String },

    #[error("unable to encode recording: {0}")]
    Encode(#[from] WavError),
}

/// The result of a finished recording, usable for local preview.
#[derive(Clone)]
pub struct RecordingHandle {
    audio: Arc<DecodedAudio>,
    recording: Arc<TrackRecording>,
}

impl RecordingHandle {
    pub fn track_id(&self) -> u32 {
        self.recording.track_id()
    }

    /// The captured audio, exactly as stored.
    pub fn audio(&self) -> Arc<DecodedAudio> {
        self.audio.clone()
    }

    /// The encoded recording held by the track audio store.
    pub fn encoded(&self) -> &[u8] {
        self.recording.encoded()
    }

    pub fn duration(&self) -> Duration {
        self.audio.duration()
    }
}

/// Everything the collector saw before the chunk channel closed.
#[derive(Default)]
struct Collected {
    chunks: Vec<Vec<f32>>,
    failure: Option<String>,
}

struct Session {
    capture: Box<dyn Capture>,
    format: CaptureFormat,
    collector: JoinHandle<Collected>,
}

struct Inner {
    state: RecorderState,
    /// Bumped for every session so stale tasks can't touch a newer one.
    generation: u64,
    session: Option<Session>,
    /// A device failure that ended a session nobody was stopping yet.
    failure: Option<(u32, String)>,
}

/// Records the microphone into the track audio store.
pub struct Recorder {
    input: Arc<dyn InputDevice>,
    store: TrackAudioStore,
    inner: Arc<Mutex<Inner>>,
}

impl Recorder {
    pub fn new(input: Arc<dyn InputDevice>, store: TrackAudioStore) -> Recorder {
        Recorder {
            input,
            store,
            inner: Arc::new(Mutex::new(Inner {
                state: RecorderState::Idle,
                generation: 0,
                session: None,
                failure: None,
            })),
        }
    }

    pub fn state(&self) -> RecorderState {
        self.inner.lock().state
    }

    /// Returns true while any session is in flight.
    pub fn is_recording(&self) -> bool {
        self.state() != RecorderState::Idle
    }

    /// Starts recording the given track. Returns false if another session is in
    /// flight (which is left untouched) or the microphone can't be acquired.
    pub async fn start_recording(&self, track_id: u32) -> bool {
        let span = span!(Level::INFO, "start recording", track = track_id);
        self.start(track_id).instrument(span).await
    }

    async fn start(&self, track_id: u32) -> bool {
        let generation = {
            let mut inner = self.inner.lock();
            if inner.state != RecorderState::Idle {
                warn!(state = %inner.state, "Recording already in progress");
                return false;
            }
            inner.state = RecorderState::Opening { track_id };
            inner.generation += 1;
            inner.failure = None;
            inner.generation
        };

        let (chunks_tx, chunks_rx) = mpsc::unbounded_channel();
        let input = self.input.clone();
        let opened = tokio::task::spawn_blocking(move || input.open(chunks_tx)).await;
        let capture = match opened {
            Ok(Ok(capture)) => capture,
            Ok(Err(e)) => {
                error!(device = %self.input, err = %e, "Unable to open input device");
                self.reset_if_current(generation);
                return false;
            }
            Err(e) => {
                error!(err = %e, "Input device open task failed");
                self.reset_if_current(generation);
                return false;
            }
        };

        let format = capture.format();
        let stale = {
            let mut inner = self.inner.lock();
            if inner.generation != generation
                || inner.state != (RecorderState::Opening { track_id })
            {
                Some(capture)
            } else {
                let collector =
                    tokio::spawn(collect(chunks_rx, self.inner.clone(), generation, track_id));
                inner.state = RecorderState::Capturing { track_id };
                inner.session = Some(Session {
                    capture,
                    format,
                    collector,
                });
                None
            }
        };
        if let Some(capture) = stale {
            info!("Recorder shut down while the device was opening");
            stop_capture_async(capture).await;
            return false;
        }

        info!(
            device = %self.input,
            channels = format.channels,
            sample_rate = format.sample_rate,
            "Recording started"
        );
        true
    }

    /// Stops recording the given track. Completes after the device has flushed
    /// every buffered chunk, with the recording stored for the track.
    pub async fn stop_recording(&self, track_id: u32) -> Result<RecordingHandle, RecorderError> {
        let span = span!(Level::INFO, "stop recording", track = track_id);
        self.stop(track_id).instrument(span).await
    }

    async fn stop(&self, track_id: u32) -> Result<RecordingHandle, RecorderError> {
        let session = {
            let mut inner = self.inner.lock();
            match inner.state {
                RecorderState::Capturing { track_id: active } if active == track_id => {
                    inner.state = RecorderState::Finalizing { track_id };
                    inner.session.take()
                }
                RecorderState::Idle => {
                    if let Some((failed, message)) = inner.failure.take() {
                        if failed == track_id {
                            return Err(RecorderError::Device { track_id, message });
                        }
                        inner.failure = Some((failed, message));
                    }
                    return Err(RecorderError::NotRecording {
                        track_id,
                        state: inner.state,
                    });
                }
                state => return Err(RecorderError::NotRecording { track_id, state }),
            }
        };

        let result = match session {
            Some(session) => self.finalize(track_id, session).await,
            None => Err(RecorderError::NotRecording {
                track_id,
                state: RecorderState::Idle,
            }),
        };

        {
            let mut inner = self.inner.lock();
            if inner.state == (RecorderState::Finalizing { track_id }) {
                inner.state = RecorderState::Idle;
            }
        }

        match &result {
            Ok(handle) => info!(
                duration_ms = handle.duration().as_millis(),
                bytes = handle.encoded().len(),
                "Recording stopped"
            ),
            Err(e) => warn!(err = %e, "Recording failed"),
        }
        result
    }

    async fn finalize(
        &self,
        track_id: u32,
        session: Session,
    ) -> Result<RecordingHandle, RecorderError> {
        let Session {
            capture,
            format,
            collector,
        } = session;

        stop_capture_async(capture).await;
        let collected = collector.await.unwrap_or_else(|e| Collected {
            chunks: Vec::new(),
            failure: Some(format!("capture collector failed: {}", e)),
        });

        if let Some(message) = collected.failure {
            return Err(RecorderError::Device { track_id, message });
        }

        let chunk_count = collected.chunks.len();
        let samples: Vec<f32> = collected.chunks.concat();
        let audio = DecodedAudio::from_interleaved(&samples, format.channels, format.sample_rate);
        if audio.is_empty() {
            return Err(RecorderError::EmptyRecording(track_id));
        }

        let recording = TrackRecording::encode(track_id, &audio, chunk_count)?;
        let recording = self.store.insert(recording);
        Ok(RecordingHandle {
            audio: Arc::new(audio),
            recording,
        })
    }

    /// Stops any session in flight without storing anything.
    pub async fn shutdown(&self) {
        let session = {
            let mut inner = self.inner.lock();
            inner.generation += 1;
            inner.state = RecorderState::Idle;
            inner.failure = None;
            inner.session.take()
        };

        if let Some(session) = session {
            info!("Abandoning recording in progress");
            session.collector.abort();
            stop_capture_async(session.capture).await;
        }
    }

    fn reset_if_current(&self, generation: u64) {
        let mut inner = self.inner.lock();
        if inner.generation == generation {
            inner.state = RecorderState::Idle;
        }
    }
}

fn stop_capture(capture: Box<dyn Capture>) {
    capture.stop();
}

/// Stops the device off the async runtime; cpal captures join their stream thread.
async fn stop_capture_async(capture: Box<dyn Capture>) {
    if let Err(e) = tokio::task::spawn_blocking(move || stop_capture(capture)).await {
        error!(err = %e, "Input device stop task failed");
    }
}

/// Drains the chunk channel until it closes. A device failure ends the
/// session right away unless a stop is already waiting for this collector.
async fn collect(
    mut chunks_rx: UnboundedReceiver<CaptureEvent>,
    inner: Arc<Mutex<Inner>>,
    generation: u64,
    track_id: u32,
) -> Collected {
    let mut collected = Collected::default();
    while let Some(event) = chunks_rx.recv().await {
        match event {
            CaptureEvent::Chunk(chunk) => collected.chunks.push(chunk),
            CaptureEvent::Failed(message) => {
                error!(track = track_id, err = %message, "Input device failed while recording");
                let capture = {
                    let mut inner = inner.lock();
                    if inner.generation == generation
                        && inner.state == (RecorderState::Capturing { track_id })
                    {
                        inner.state = RecorderState::Idle;
                        inner.failure = Some((track_id, message.clone()));
                        inner.session.take().map(|session| session.capture)
                    } else {
                        None
                    }
                };
                if let Some(capture) = capture {
                    stop_capture_async(capture).await;
                }
                collected.failure = Some(message);
                return collected;
            }
        }
    }
    collected
}
