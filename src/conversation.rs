//! Chat orchestration
//!
//! Wires a [`CaptureSession`] to a [`QueryClient`] and renders the exchange
//! through a [`Transcript`]. This is the single place where failures are
//! caught: each one is logged with detail and shown as a generic apology.

use std::fmt;
use std::io::Write as _;

use tokio::sync::mpsc;

use crate::capture::{
    AudioPayload, CaptureEvent, CaptureSession, CaptureState, ChannelObserver, PermissionState,
};
use crate::query::{QueryClient, QueryReply};
use crate::voice::{AudioInput, AudioOutput};
use crate::{Error, Result};

/// Assistant message shown for any failed exchange
pub const APOLOGY: &str = "Sorry, there was an error processing your request.";

/// Who a chat message is from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    User,
    Assistant,
}

impl Sender {
    /// Lowercase label
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One transcript line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub text: String,
    pub sender: Sender,
}

impl ChatMessage {
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sender: Sender::User,
        }
    }

    #[must_use]
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sender: Sender::Assistant,
        }
    }
}

/// Renders the conversation
pub trait Transcript {
    /// Append a message and bring it into view
    fn append(&mut self, message: ChatMessage);

    /// Replace the status line
    fn status(&mut self, status: &str);
}

/// Transcript printed to stdout
#[derive(Debug, Default)]
pub struct TerminalTranscript;

impl Transcript for TerminalTranscript {
    fn append(&mut self, message: ChatMessage) {
        let label = match message.sender {
            Sender::User => "you",
            Sender::Assistant => "assistant",
        };
        println!("{label:>9} │ {}", message.text);
    }

    fn status(&mut self, status: &str) {
        println!("          · {status}");
        std::io::stdout().flush().ok();
    }
}

/// One user driving voice and text exchanges
pub struct Conversation<I, O, T> {
    capture: CaptureSession<I, ChannelObserver>,
    events: mpsc::UnboundedReceiver<CaptureEvent>,
    client: QueryClient<O>,
    transcript: T,
    playback: bool,
}

impl<I: AudioInput, O: AudioOutput, T: Transcript> Conversation<I, O, T> {
    /// Create a conversation; the microphone is not touched until
    /// [`Conversation::setup_microphone`]
    pub fn new(input: I, client: QueryClient<O>, transcript: T) -> Self {
        let (observer, events) = ChannelObserver::channel();
        Self {
            capture: CaptureSession::new(input, observer),
            events,
            client,
            transcript,
            playback: true,
        }
    }

    /// Enable or disable reply playback
    #[must_use]
    pub fn with_playback(mut self, enabled: bool) -> Self {
        self.playback = enabled;
        self
    }

    /// The transcript collaborator
    pub const fn transcript(&self) -> &T {
        &self.transcript
    }

    /// Current capture state
    pub const fn capture_state(&self) -> CaptureState {
        self.capture.state()
    }

    /// The query client
    pub const fn client(&self) -> &QueryClient<O> {
        &self.client
    }

    /// Ask for microphone access
    ///
    /// Returns whether voice input is available.
    pub async fn setup_microphone(&mut self) -> bool {
        match self.capture.request_permission().await {
            PermissionState::Granted => true,
            _ => {
                tracing::warn!(error = %Error::PermissionDenied, "voice input disabled");
                self.transcript.status("Microphone access denied");
                false
            }
        }
    }

    /// Start recording, or stop and submit the running recording
    ///
    /// Without microphone access this asks for it again instead.
    ///
    /// # Errors
    ///
    /// Returns the failure after it has been rendered
    pub async fn toggle_recording(&mut self) -> Result<()> {
        match self.capture.state() {
            CaptureState::Idle => {
                if self.setup_microphone().await {
                    self.transcript.status("Ready");
                    Ok(())
                } else {
                    Err(Error::PermissionDenied)
                }
            }
            CaptureState::Permitted => {
                let result = self.capture.start_capture().await;
                self.settle_capture(result, "Could not start recording").await
            }
            CaptureState::Recording => {
                let result = self.capture.stop_capture().await;
                self.settle_capture(result, "Error processing speech").await
            }
        }
    }

    async fn settle_capture(&mut self, result: Result<()>, status: &str) -> Result<()> {
        if let Err(e) = result {
            tracing::error!(error = %e, "capture failed");
            self.transcript.status(status);
            return Err(e);
        }
        self.drain_events().await
    }

    /// Handle every pending capture notification, in order
    async fn drain_events(&mut self) -> Result<()> {
        let mut outcome = Ok(());
        while let Ok(event) = self.events.try_recv() {
            match event {
                CaptureEvent::RecordingStarted => self.transcript.status("Recording..."),
                CaptureEvent::RecordingStopped => self.transcript.status("Processing..."),
                CaptureEvent::AudioReady(payload) => {
                    outcome = self.send_audio(payload).await;
                }
            }
        }
        outcome
    }

    /// Submit a recording and render the reply
    ///
    /// # Errors
    ///
    /// Returns the failure after it has been rendered
    pub async fn send_audio(&mut self, payload: AudioPayload) -> Result<()> {
        self.transcript.append(ChatMessage::user("Sending audio..."));

        let reply = match self.client.submit_audio(payload).await {
            Ok(reply) => reply,
            Err(e) => return Err(self.report_failure(e, "Error processing speech")),
        };

        self.transcript.append(ChatMessage::user(reply.query.clone()));
        self.respond(reply).await
    }

    /// Submit typed text and render the reply
    ///
    /// Blank text is ignored and returns `Ok(false)`.
    ///
    /// # Errors
    ///
    /// Returns the failure after it has been rendered
    pub async fn send_text(&mut self, text: &str) -> Result<bool> {
        let query = text.trim();
        if query.is_empty() {
            return Ok(false);
        }

        self.transcript.append(ChatMessage::user(query));
        self.transcript.status("Processing...");

        let reply = match self.client.submit_text(query).await {
            Ok(reply) => reply,
            Err(e) => return Err(self.report_failure(e, "Error processing query")),
        };

        self.respond(reply).await?;
        Ok(true)
    }

    async fn respond(&mut self, reply: QueryReply) -> Result<()> {
        self.transcript
            .append(ChatMessage::assistant(reply.text_response));

        match reply.audio_response {
            Some(audio) if self.playback => {
                self.transcript.status("Playing response...");
                if let Err(e) = self.client.play_reply(&audio).await {
                    tracing::error!(error = %e, "reply playback failed");
                    self.transcript.status("Playback failed");
                    return Err(e);
                }
            }
            Some(_) => tracing::debug!("playback disabled, skipping reply audio"),
            None => tracing::info!(
                notice = reply.error.as_deref().unwrap_or_default(),
                "reply carried no audio"
            ),
        }

        self.transcript.status("Ready");
        Ok(())
    }

    fn report_failure(&mut self, error: Error, status: &str) -> Error {
        tracing::error!(error = %error, remote = error.is_remote(), "{status}");
        self.transcript.status(status);
        self.transcript.append(ChatMessage::assistant(APOLOGY));
        error
    }

    /// Release the microphone
    pub fn release(&mut self) {
        self.capture.release();
    }
}
