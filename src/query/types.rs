//! Wire types for the query endpoint

use serde::{Deserialize, Serialize};

use crate::capture::AudioPayload;
use crate::{Error, Result};

/// Request body: exactly one of `{"audio": ...}` or `{"query": ...}`
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryRequest<'a> {
    /// Recorded speech
    Audio(&'a AudioPayload),
    /// Typed text
    Query(&'a str),
}

/// Reply to one query
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct QueryReply {
    /// The query as the server understood it (transcript for audio)
    pub query: String,

    /// Assistant's text answer
    pub text_response: String,

    /// Base64 MP3 of the spoken answer; `null` when synthesis failed
    #[serde(deserialize_with = "Option::deserialize")]
    pub audio_response: Option<String>,

    /// Server notice accompanying a partial reply
    #[serde(default)]
    pub error: Option<String>,
}

impl QueryReply {
    /// Parse and validate a reply body
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedReply`] if a field is missing or mistyped
    pub fn parse(body: &str) -> Result<Self> {
        serde_json::from_str(body).map_err(|e| Error::MalformedReply(e.to_string()))
    }
}

/// Error body returned with non-success statuses
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Human-readable detail from a failed response body
pub(crate) fn server_error_detail(body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body).map_or_else(
        |_| body.trim().chars().take(200).collect(),
        |b| b.error,
    )
}

/// Reply from the health endpoint
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HealthStatus {
    /// `"ok"` when the service is up
    pub status: String,

    /// Free-form message
    #[serde(default)]
    pub message: String,
}

impl HealthStatus {
    /// Whether the server reported itself healthy
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status.eq_ignore_ascii_case("ok")
    }
}

/// Reply from the document upload endpoint
#[derive(Debug, Deserialize)]
pub(crate) struct UploadReply {
    pub message: String,
}
