//! Finished recording payload

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;

use crate::{Error, Result};

/// Base64 text of one finished recording, ready to send
///
/// Serializes as a bare JSON string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AudioPayload(String);

impl AudioPayload {
    /// Encode the concatenation of `chunks`, in order
    #[must_use]
    pub fn from_chunks<C: AsRef<[u8]>>(chunks: &[C]) -> Self {
        let total = chunks.iter().map(|c| c.as_ref().len()).sum();
        let mut joined = Vec::with_capacity(total);
        for chunk in chunks {
            joined.extend_from_slice(chunk.as_ref());
        }
        Self::from_audio_bytes(&joined)
    }

    /// Encode a complete audio file
    #[must_use]
    pub fn from_audio_bytes(bytes: &[u8]) -> Self {
        Self(STANDARD.encode(bytes))
    }

    /// Accept already-encoded text, with or without a `data:` URL prefix
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if the text is not valid base64
    pub fn from_encoded(text: &str) -> Result<Self> {
        let encoded = strip_data_url_prefix(text.trim()).trim();
        STANDARD
            .decode(encoded)
            .map_err(|e| Error::Decode(e.to_string()))?;
        Ok(Self(encoded.to_string()))
    }

    /// The base64 text
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Length of the base64 text
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the recording produced no audio at all
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Decode back to the raw audio bytes
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if the payload is not valid base64
    pub fn decode(&self) -> Result<Vec<u8>> {
        STANDARD
            .decode(&self.0)
            .map_err(|e| Error::Decode(e.to_string()))
    }

    /// Consume into the base64 text
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

/// Strip a `data:<mime>;base64,` prefix if present
#[must_use]
pub fn strip_data_url_prefix(text: &str) -> &str {
    if text.starts_with("data:") {
        text.split_once(',').map_or(text, |(_, rest)| rest)
    } else {
        text
    }
}
