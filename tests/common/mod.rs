//! Shared test utilities
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use url::Url;
use voxquery::{
    AudioClip, AudioInput, AudioOutput, CaptureEvent, CaptureObserver, ChatMessage, ChunkSink,
    Error, Result, Transcript,
};

/// Call counters shared between a scripted device and the test
#[derive(Debug, Clone, Default)]
pub struct DeviceCalls {
    opens: Arc<AtomicUsize>,
    begins: Arc<AtomicUsize>,
    finishes: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
}

impl DeviceCalls {
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn begins(&self) -> usize {
        self.begins.load(Ordering::SeqCst)
    }

    pub fn finishes(&self) -> usize {
        self.finishes.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

/// Input device that replays scripted chunks instead of touching hardware
///
/// Each recording pushes the next scripted chunk list while running and
/// `final_chunk` (if any) when finalized.
pub struct ScriptedInput {
    grant: bool,
    sessions: VecDeque<Vec<Vec<u8>>>,
    final_chunk: Option<Vec<u8>>,
    fail_finish: bool,
    sink: Option<ChunkSink>,
    calls: DeviceCalls,
}

impl ScriptedInput {
    /// Device that grants access
    pub fn granting() -> Self {
        Self {
            grant: true,
            sessions: VecDeque::new(),
            final_chunk: None,
            fail_finish: false,
            sink: None,
            calls: DeviceCalls::default(),
        }
    }

    /// Device that refuses access
    pub fn denying() -> Self {
        Self {
            grant: false,
            ..Self::granting()
        }
    }

    /// Queue the chunks produced by the next recording
    #[must_use]
    pub fn with_session(mut self, chunks: Vec<Vec<u8>>) -> Self {
        self.sessions.push_back(chunks);
        self
    }

    /// Chunk pushed when each recording is finalized
    #[must_use]
    pub fn with_final_chunk(mut self, chunk: Vec<u8>) -> Self {
        self.final_chunk = Some(chunk);
        self
    }

    /// Make finalizing fail
    #[must_use]
    pub fn failing_finish(mut self) -> Self {
        self.fail_finish = true;
        self
    }

    /// Handle on the call counters
    pub fn calls(&self) -> DeviceCalls {
        self.calls.clone()
    }
}

#[async_trait(?Send)]
impl AudioInput for ScriptedInput {
    async fn open(&mut self) -> Result<()> {
        self.calls.opens.fetch_add(1, Ordering::SeqCst);
        if self.grant {
            Ok(())
        } else {
            Err(Error::Audio("permission refused".to_string()))
        }
    }

    async fn begin(&mut self, sink: ChunkSink) -> Result<()> {
        self.calls.begins.fetch_add(1, Ordering::SeqCst);
        for chunk in self.sessions.pop_front().unwrap_or_default() {
            sink.push(chunk);
        }
        self.sink = Some(sink);
        Ok(())
    }

    async fn finish(&mut self) -> Result<()> {
        self.calls.finishes.fetch_add(1, Ordering::SeqCst);
        let sink = self.sink.take().ok_or(Error::NotRecording)?;
        if self.fail_finish {
            return Err(Error::Audio("device unplugged".to_string()));
        }
        if let Some(chunk) = self.final_chunk.clone() {
            sink.push(chunk);
        }
        Ok(())
    }

    fn close(&mut self) {
        self.calls.closes.fetch_add(1, Ordering::SeqCst);
        self.sink = None;
    }
}

/// Observer that records every notification
#[derive(Debug, Default)]
pub struct RecordedEvents {
    pub events: Vec<CaptureEvent>,
}

impl CaptureObserver for RecordedEvents {
    fn on_recording_start(&mut self) {
        self.events.push(CaptureEvent::RecordingStarted);
    }

    fn on_recording_stop(&mut self) {
        self.events.push(CaptureEvent::RecordingStopped);
    }

    fn on_audio_ready(&mut self, payload: voxquery::AudioPayload) {
        self.events.push(CaptureEvent::AudioReady(payload));
    }
}

/// Output that records clip sizes instead of playing them
#[derive(Debug, Clone, Default)]
pub struct MockOutput {
    played: Arc<Mutex<Vec<usize>>>,
    fail: bool,
}

impl MockOutput {
    /// Output whose every playback fails
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Sizes of the clips handed to the output, in order
    pub fn played(&self) -> Vec<usize> {
        self.played.lock().unwrap().clone()
    }
}

#[async_trait(?Send)]
impl AudioOutput for MockOutput {
    async fn play(&mut self, clip: AudioClip) -> Result<()> {
        self.played.lock().unwrap().push(clip.len());
        if self.fail {
            Err(Error::Audio("speaker error".to_string()))
        } else {
            Ok(())
        }
    }
}

/// Transcript kept in memory
#[derive(Debug, Default)]
pub struct MemoryTranscript {
    pub messages: Vec<ChatMessage>,
    pub statuses: Vec<String>,
}

impl MemoryTranscript {
    pub fn last_status(&self) -> Option<&str> {
        self.statuses.last().map(String::as_str)
    }
}

impl Transcript for MemoryTranscript {
    fn append(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    fn status(&mut self, status: &str) {
        self.statuses.push(status.to_string());
    }
}

/// Serve `router` on an ephemeral local port and return its base URL
pub async fn spawn_server(router: axum::Router) -> Url {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind test server");
    let addr = listener.local_addr().expect("no local addr");

    tokio::spawn(async move {
        axum::serve(listener, router)
            .await
            .expect("test server failed");
    });

    Url::parse(&format!("http://{addr}/")).expect("invalid server url")
}

/// Query endpoint URL on a test server
pub fn query_url(base: &Url) -> Url {
    base.join("/api/query").expect("invalid endpoint")
}
