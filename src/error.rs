//! Error types for voxquery

use thiserror::Error;

/// Result type alias for voxquery operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in voxquery
#[derive(Debug, Error)]
pub enum Error {
    /// Microphone access was refused
    #[error("microphone access denied")]
    PermissionDenied,

    /// Capture attempted without a granted input stream
    #[error("no active input stream")]
    NoActiveStream,

    /// A recording session is already running
    #[error("recording already in progress")]
    AlreadyRecording,

    /// Stop requested while nothing is recording
    #[error("not recording")]
    NotRecording,

    /// Network or HTTP failure while talking to the query endpoint
    #[error("transport error: {0}")]
    Transport(String),

    /// Reply body did not match the expected shape
    #[error("malformed reply: {0}")]
    MalformedReply(String),

    /// Base64 or audio container decoding failed
    #[error("decode error: {0}")]
    Decode(String),

    /// Audio playback failed
    #[error("playback error: {0}")]
    Playback(String),

    /// Document upload rejected before sending
    #[error("upload error: {0}")]
    Upload(String),

    /// Audio device error
    #[error("audio error: {0}")]
    Audio(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing error
    #[error("url error: {0}")]
    Url(#[from] url::ParseError),
}

impl Error {
    /// Whether this failure happened on the way to or from the query endpoint
    #[must_use]
    pub const fn is_remote(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::MalformedReply(_))
    }
}
