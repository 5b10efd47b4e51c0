//! Audio device seams
//!
//! [`AudioInput`] and [`AudioOutput`] are the platform boundary of the
//! client. The cpal-backed implementations live in `capture` and
//! `playback`; tests substitute scripted doubles.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::Result;

mod capture;
mod playback;

pub use capture::{CpalInput, SAMPLE_RATE, samples_to_wav};
pub use playback::{SpeakerOutput, decode_mp3};

/// Input device that can be opened once and recorded from repeatedly
///
/// Chunks produced while a sub-session runs are handed to the [`ChunkSink`]
/// passed to [`AudioInput::begin`]. Every chunk of a sub-session must have
/// been pushed by the time [`AudioInput::finish`] returns.
#[async_trait(?Send)]
pub trait AudioInput {
    /// Acquire the device. An error means access was refused
    async fn open(&mut self) -> Result<()>;

    /// Start a recording sub-session; returns once recording has begun
    async fn begin(&mut self, sink: ChunkSink) -> Result<()>;

    /// Finalize the running sub-session and flush its chunks
    async fn finish(&mut self) -> Result<()>;

    /// Stop everything and release the device. Safe to call repeatedly
    fn close(&mut self);
}

/// Output device that plays one clip at a time
#[async_trait(?Send)]
pub trait AudioOutput {
    /// Play `clip` to completion
    async fn play(&mut self, clip: AudioClip) -> Result<()>;
}

/// Ordered chunk accumulator shared with a device callback
///
/// Zero-length chunks are dropped on push.
#[derive(Debug, Clone, Default)]
pub struct ChunkSink {
    chunks: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl ChunkSink {
    /// Create an empty sink
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk, ignoring empty ones
    pub fn push(&self, chunk: Vec<u8>) {
        if chunk.is_empty() {
            tracing::trace!("dropping empty audio chunk");
            return;
        }

        if let Ok(mut chunks) = self.chunks.lock() {
            chunks.push(chunk);
        }
    }

    /// Number of chunks accumulated so far
    #[must_use]
    pub fn len(&self) -> usize {
        self.chunks.lock().map(|c| c.len()).unwrap_or_default()
    }

    /// Whether no chunk has been accumulated
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Take all accumulated chunks, leaving the sink empty
    #[must_use]
    pub fn take(&self) -> Vec<Vec<u8>> {
        self.chunks
            .lock()
            .map(|mut c| std::mem::take(&mut *c))
            .unwrap_or_default()
    }
}

/// Decoded reply audio, owned by exactly one playback
#[derive(Debug)]
pub struct AudioClip {
    bytes: Vec<u8>,
}

impl AudioClip {
    /// Wrap encoded audio bytes (MP3 from the reply)
    #[must_use]
    pub const fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Raw encoded bytes
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Size in bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the clip carries no audio at all
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
