//! voxquery - voice and text chat client for a spoken query service
//!
//! This library provides:
//! - A capture session that turns a microphone recording into a payload
//! - A query client that exchanges one request for one reply and plays
//!   the reply audio
//! - A conversation orchestrator that wires the two to a transcript
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                  Conversation                         │
//! │   Transcript  │  status line  │  error policy         │
//! └───────┬──────────────────────────────┬───────────────┘
//!         │ CaptureEvent                 │ QueryReply
//! ┌───────▼──────────────┐     ┌─────────▼───────────────┐
//! │    CaptureSession    │     │      QueryClient        │
//! │  Idle/Permitted/Rec  │     │  POST /api/query, play  │
//! └───────┬──────────────┘     └─────────┬───────────────┘
//!         │ AudioInput                   │ AudioOutput
//! ┌───────▼──────────────────────────────▼───────────────┐
//! │                 voice (cpal devices)                  │
//! └──────────────────────────────────────────────────────┘
//! ```

pub mod capture;
pub mod config;
pub mod conversation;
pub mod error;
pub mod query;
pub mod voice;

pub use capture::{
    AudioPayload, CaptureEvent, CaptureObserver, CaptureSession, CaptureState, ChannelObserver,
    PermissionState,
};
pub use config::Config;
pub use conversation::{ChatMessage, Conversation, Sender, TerminalTranscript, Transcript};
pub use error::{Error, Result};
pub use query::{HealthStatus, QueryClient, QueryReply};
pub use voice::{AudioClip, AudioInput, AudioOutput, ChunkSink, CpalInput, SpeakerOutput};
