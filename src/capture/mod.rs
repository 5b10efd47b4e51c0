//! Microphone capture session
//!
//! Owns the input device and turns one start/stop interval into a single
//! [`AudioPayload`], reporting progress through a [`CaptureObserver`].
//!
//! ```text
//!   Idle ──request_permission──▶ Permitted ──start_capture──▶ Recording
//!    ▲                              ▲                            │
//!    └──────────release─────────────┴────────stop_capture────────┘
//! ```

use std::time::Instant;

use tokio::sync::mpsc;

use crate::voice::{AudioInput, ChunkSink};
use crate::{Error, Result};

mod payload;

pub use payload::{AudioPayload, strip_data_url_prefix};

/// Outcome of asking for microphone access
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PermissionState {
    /// Access has not been asked for yet
    #[default]
    Unrequested,
    /// Device is open and held
    Granted,
    /// Access was refused; nothing is held
    Denied,
}

/// Lifecycle state of a capture session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    /// No device held
    Idle,
    /// Device held, not recording
    Permitted,
    /// Recording sub-session running
    Recording,
}

/// Receives capture lifecycle notifications
///
/// For one recording the order is always `on_recording_start`, then
/// `on_recording_stop`, then `on_audio_ready`.
pub trait CaptureObserver {
    /// Recording has begun
    fn on_recording_start(&mut self);

    /// Recording has been finalized
    fn on_recording_stop(&mut self);

    /// The finished recording is ready to submit
    fn on_audio_ready(&mut self, payload: AudioPayload);
}

/// Capture notification as a value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureEvent {
    /// See [`CaptureObserver::on_recording_start`]
    RecordingStarted,
    /// See [`CaptureObserver::on_recording_stop`]
    RecordingStopped,
    /// See [`CaptureObserver::on_audio_ready`]
    AudioReady(AudioPayload),
}

/// Observer that forwards notifications into a channel
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<CaptureEvent>,
}

impl ChannelObserver {
    /// Create an observer and the receiving end of its channel
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<CaptureEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: CaptureEvent) {
        if self.tx.send(event).is_err() {
            tracing::warn!("capture event receiver dropped");
        }
    }
}

impl CaptureObserver for ChannelObserver {
    fn on_recording_start(&mut self) {
        self.send(CaptureEvent::RecordingStarted);
    }

    fn on_recording_stop(&mut self) {
        self.send(CaptureEvent::RecordingStopped);
    }

    fn on_audio_ready(&mut self, payload: AudioPayload) {
        self.send(CaptureEvent::AudioReady(payload));
    }
}

struct Recording {
    sink: ChunkSink,
    started_at: Instant,
}

/// Exclusive owner of the microphone and of at most one recording
pub struct CaptureSession<I, O> {
    input: I,
    observer: O,
    permission: PermissionState,
    recording: Option<Recording>,
}

impl<I: AudioInput, O: CaptureObserver> CaptureSession<I, O> {
    /// Create a session over `input`, reporting to `observer`
    pub const fn new(input: I, observer: O) -> Self {
        Self {
            input,
            observer,
            permission: PermissionState::Unrequested,
            recording: None,
        }
    }

    /// Current permission outcome
    pub const fn permission(&self) -> PermissionState {
        self.permission
    }

    /// Current lifecycle state
    pub const fn state(&self) -> CaptureState {
        if self.recording.is_some() {
            CaptureState::Recording
        } else if matches!(self.permission, PermissionState::Granted) {
            CaptureState::Permitted
        } else {
            CaptureState::Idle
        }
    }

    /// Whether a recording is running
    pub const fn is_recording(&self) -> bool {
        self.recording.is_some()
    }

    /// Ask for microphone access and hold the device on success
    ///
    /// Calling again after a grant is a no-op; calling again after a denial
    /// asks again.
    pub async fn request_permission(&mut self) -> PermissionState {
        if self.permission == PermissionState::Granted {
            return self.permission;
        }

        self.permission = match self.input.open().await {
            Ok(()) => {
                tracing::info!("microphone access granted");
                PermissionState::Granted
            }
            Err(e) => {
                tracing::warn!(error = %e, "microphone access denied");
                PermissionState::Denied
            }
        };

        self.permission
    }

    /// Begin a new recording
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyRecording`] if a recording is running (it is
    /// left untouched), [`Error::NoActiveStream`] without a granted device,
    /// or the device's error if recording could not begin.
    pub async fn start_capture(&mut self) -> Result<()> {
        if self.recording.is_some() {
            return Err(Error::AlreadyRecording);
        }
        if self.permission != PermissionState::Granted {
            tracing::debug!(permission = ?self.permission, "capture refused");
            return Err(Error::NoActiveStream);
        }

        let sink = ChunkSink::new();
        self.input.begin(sink.clone()).await?;

        self.recording = Some(Recording {
            sink,
            started_at: Instant::now(),
        });
        tracing::debug!("recording started");
        self.observer.on_recording_start();

        Ok(())
    }

    /// Finalize the running recording and deliver its payload
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotRecording`] if nothing is recording, without
    /// notifying the observer, or the device's error if finalizing failed.
    /// The session is no longer recording in either case.
    pub async fn stop_capture(&mut self) -> Result<()> {
        let Some(recording) = self.recording.take() else {
            return Err(Error::NotRecording);
        };

        self.input.finish().await?;

        let chunks = recording.sink.take();
        let payload = AudioPayload::from_chunks(&chunks);

        tracing::debug!(
            chunks = chunks.len(),
            encoded_len = payload.len(),
            elapsed_ms = recording.started_at.elapsed().as_millis(),
            "recording finalized"
        );

        self.observer.on_recording_stop();
        self.observer.on_audio_ready(payload);

        Ok(())
    }

    /// Stop any recording and release the device
    pub fn release(&mut self) {
        if self.recording.take().is_some() {
            tracing::debug!("recording discarded on release");
        }
        self.input.close();
        self.permission = PermissionState::Unrequested;
    }

    /// The observer, for inspection
    pub const fn observer(&self) -> &O {
        &self.observer
    }
}
