//! Query endpoint client
//!
//! One request, one reply: no retries and no client-side timeout. Reply
//! audio is decoded here and handed to an [`AudioOutput`].

use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::StatusCode;
use url::Url;

use crate::capture::AudioPayload;
use crate::voice::{AudioClip, AudioOutput};
use crate::{Error, Result};

mod types;

pub use types::{HealthStatus, QueryReply, QueryRequest};

use types::{UploadReply, server_error_detail};

/// Default query endpoint path
pub const DEFAULT_ENDPOINT: &str = "/api/query";

/// Health check path, resolved against the endpoint's origin
const HEALTH_PATH: &str = "/health";

/// Document upload path, resolved against the endpoint's origin
const UPLOAD_PATH: &str = "/api/upload";

/// Talks to the query endpoint and plays reply audio
pub struct QueryClient<O> {
    client: reqwest::Client,
    endpoint: Url,
    output: O,
}

impl<O: AudioOutput> QueryClient<O> {
    /// Create a client for `endpoint`, playing replies on `output`
    pub fn new(endpoint: Url, output: O) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            output,
        }
    }

    /// The query endpoint
    pub const fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Submit a finished recording
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] on network failure or non-success
    /// status, [`Error::MalformedReply`] if the reply cannot be parsed
    pub async fn submit_audio(&self, payload: AudioPayload) -> Result<QueryReply> {
        tracing::debug!(encoded_len = payload.len(), "submitting audio query");
        self.submit(&QueryRequest::Audio(&payload)).await
    }

    /// Submit typed text
    ///
    /// Callers reject blank text before calling.
    ///
    /// # Errors
    ///
    /// Same as [`QueryClient::submit_audio`]
    pub async fn submit_text(&self, text: &str) -> Result<QueryReply> {
        tracing::debug!(chars = text.chars().count(), "submitting text query");
        self.submit(&QueryRequest::Query(text)).await
    }

    async fn submit(&self, request: &QueryRequest<'_>) -> Result<QueryReply> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, endpoint = %self.endpoint, "query request failed");
                Error::Transport(e.to_string())
            })?;

        let (status, body) = read_body(response).await?;
        tracing::debug!(status = %status, bytes = body.len(), "received reply");

        if !status.is_success() {
            return Err(status_error(status, &body));
        }

        let reply = QueryReply::parse(&body).inspect_err(|e| {
            tracing::error!(error = %e, "failed to parse reply");
        })?;

        if let Some(notice) = &reply.error {
            tracing::warn!(notice = %notice, "server returned a partial reply");
        }
        tracing::info!(query = %reply.query, "query answered");

        Ok(reply)
    }

    /// Decode and play a reply's audio
    ///
    /// The decoded clip lives only for this call.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if `audio_response` is not base64 (nothing
    /// is played), [`Error::Playback`] if the output fails
    pub async fn play_reply(&mut self, audio_response: &str) -> Result<()> {
        let bytes = STANDARD
            .decode(audio_response.trim())
            .map_err(|e| Error::Decode(e.to_string()))?;

        let clip = AudioClip::new(bytes);
        tracing::debug!(bytes = clip.len(), "playing reply audio");

        self.output.play(clip).await.map_err(|e| match e {
            Error::Playback(_) => e,
            other => Error::Playback(other.to_string()),
        })
    }

    /// Check the server's health endpoint
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] or [`Error::MalformedReply`]
    pub async fn health(&self) -> Result<HealthStatus> {
        let url = self.endpoint.join(HEALTH_PATH)?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;

        let (status, body) = read_body(response).await?;
        if !status.is_success() {
            return Err(status_error(status, &body));
        }

        serde_json::from_str(&body).map_err(|e| Error::MalformedReply(e.to_string()))
    }

    /// Upload a plain-text knowledge document
    ///
    /// Returns the server's confirmation message.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Upload`] for anything but a `.txt` file, plus the
    /// usual transport and reply errors
    pub async fn upload_document(&self, path: &Path) -> Result<String> {
        let is_txt = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("txt"));
        if !is_txt {
            return Err(Error::Upload(format!(
                "only .txt files are allowed: {}",
                path.display()
            )));
        }

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("document.txt")
            .to_string();
        let content = tokio::fs::read(path).await?;

        let part = reqwest::multipart::Part::bytes(content)
            .file_name(file_name)
            .mime_str("text/plain")
            .map_err(|e| Error::Upload(e.to_string()))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let url = self.endpoint.join(UPLOAD_PATH)?;
        let response = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;

        let (status, body) = read_body(response).await?;
        if !status.is_success() {
            return Err(status_error(status, &body));
        }

        let reply: UploadReply =
            serde_json::from_str(&body).map_err(|e| Error::MalformedReply(e.to_string()))?;
        tracing::info!(path = %path.display(), "document uploaded");

        Ok(reply.message)
    }
}

async fn read_body(response: reqwest::Response) -> Result<(StatusCode, String)> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| Error::Transport(e.to_string()))?;
    Ok((status, body))
}

fn status_error(status: StatusCode, body: &str) -> Error {
    let detail = server_error_detail(body);
    tracing::error!(status = %status, detail = %detail, "query endpoint error");
    Error::Transport(format!("server returned {status}: {detail}"))
}
