//! Query client tests against an in-process HTTP server

use std::sync::{Arc, Mutex};

use axum::extract::Multipart;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use voxquery::{AudioPayload, Error, QueryClient};

mod common;
use common::{MockOutput, query_url, spawn_server};

type Seen = Arc<Mutex<Vec<Value>>>;

/// Router that echoes a fixed reply and records request bodies
fn reply_router(reply: Value, seen: Seen) -> Router {
    Router::new().route(
        "/api/query",
        post(move |Json(body): Json<Value>| {
            let reply = reply.clone();
            let seen = Arc::clone(&seen);
            async move {
                seen.lock().unwrap().push(body);
                Json(reply)
            }
        }),
    )
}

fn failing_router(status: StatusCode, body: &'static str) -> Router {
    Router::new().route("/api/query", post(move || async move { (status, body) }))
}

#[tokio::test]
async fn test_submit_text_returns_reply_verbatim() {
    let seen = Seen::default();
    let reply = json!({
        "query": "hello",
        "text_response": "hi there",
        "audio_response": "SUQzBAAAAAAAI1RTU0UAAAAPAAADTGF2ZjU4Ljc2LjEwMAAAAAAAAAAAAAAA"
    });
    let base = spawn_server(reply_router(reply, Arc::clone(&seen))).await;
    let client = QueryClient::new(query_url(&base), MockOutput::default());

    let reply = client.submit_text("hello").await.unwrap();

    assert_eq!(reply.query, "hello");
    assert_eq!(reply.text_response, "hi there");
    assert_eq!(
        reply.audio_response.as_deref(),
        Some("SUQzBAAAAAAAI1RTU0UAAAAPAAADTGF2ZjU4Ljc2LjEwMAAAAAAAAAAAAAAA")
    );
    assert_eq!(*seen.lock().unwrap(), vec![json!({ "query": "hello" })]);
}

#[tokio::test]
async fn test_submit_audio_sends_payload_field() {
    let seen = Seen::default();
    let reply = json!({
        "query": "what's the weather",
        "text_response": "sunny",
        "audio_response": "AAAA"
    });
    let base = spawn_server(reply_router(reply, Arc::clone(&seen))).await;
    let client = QueryClient::new(query_url(&base), MockOutput::default());

    let payload = AudioPayload::from_audio_bytes(b"RIFF....WAVE");
    let expected = payload.as_str().to_string();
    let reply = client.submit_audio(payload).await.unwrap();

    assert_eq!(reply.query, "what's the weather");
    assert_eq!(*seen.lock().unwrap(), vec![json!({ "audio": expected })]);
}

#[tokio::test]
async fn test_server_error_is_transport_error() {
    let base = spawn_server(failing_router(
        StatusCode::INTERNAL_SERVER_ERROR,
        r#"{"error":"Internal server error"}"#,
    ))
    .await;
    let client = QueryClient::new(query_url(&base), MockOutput::default());

    let text = client.submit_text("hello").await;
    let Err(Error::Transport(message)) = text else {
        panic!("expected transport error, got {text:?}");
    };
    assert!(message.contains("500"));
    assert!(message.contains("Internal server error"));

    let audio = client
        .submit_audio(AudioPayload::from_audio_bytes(b"x"))
        .await;
    assert!(matches!(audio, Err(Error::Transport(_))));
}

#[tokio::test]
async fn test_client_error_status_is_transport_error() {
    let base = spawn_server(failing_router(
        StatusCode::TOO_MANY_REQUESTS,
        r#"{"error":"Rate limit exceeded"}"#,
    ))
    .await;
    let client = QueryClient::new(query_url(&base), MockOutput::default());

    let result = client.submit_text("hello").await;
    assert!(matches!(result, Err(Error::Transport(m)) if m.contains("Rate limit exceeded")));
}

#[tokio::test]
async fn test_unexpected_shape_is_malformed_reply() {
    let base = spawn_server(reply_router(
        json!({ "answer": "42" }),
        Seen::default(),
    ))
    .await;
    let client = QueryClient::new(query_url(&base), MockOutput::default());

    let result = client.submit_text("hello").await;
    assert!(matches!(result, Err(Error::MalformedReply(_))));
}

#[tokio::test]
async fn test_non_json_body_is_malformed_reply() {
    let base = spawn_server(failing_router(StatusCode::OK, "<html>hello</html>")).await;
    let client = QueryClient::new(query_url(&base), MockOutput::default());

    let result = client.submit_text("hello").await;
    assert!(matches!(result, Err(Error::MalformedReply(_))));
}

#[tokio::test]
async fn test_partial_reply_without_audio() {
    let reply = json!({
        "query": "hello",
        "text_response": "hi",
        "audio_response": null,
        "error": "Text-to-speech failed, but text response is available"
    });
    let base = spawn_server(reply_router(reply, Seen::default())).await;
    let client = QueryClient::new(query_url(&base), MockOutput::default());

    let reply = client.submit_text("hello").await.unwrap();
    assert!(reply.audio_response.is_none());
    assert!(reply.error.is_some());
}

#[tokio::test]
async fn test_unreachable_server_is_transport_error() {
    // Bind then drop a listener so the port is closed
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let url = url::Url::parse(&format!("http://{addr}/api/query")).unwrap();
    let client = QueryClient::new(url, MockOutput::default());

    let result = client.submit_text("hello").await;
    assert!(matches!(result, Err(Error::Transport(_))));
}

#[tokio::test]
async fn test_play_reply_hands_decoded_clip_to_output() {
    let output = MockOutput::default();
    let mut client = QueryClient::new(
        url::Url::parse("http://127.0.0.1:9/api/query").unwrap(),
        output.clone(),
    );

    client.play_reply("aGVsbG8gd29ybGQ=").await.unwrap();
    assert_eq!(output.played(), vec![11]);
}

#[tokio::test]
async fn test_play_reply_rejects_invalid_base64_before_playback() {
    let output = MockOutput::default();
    let mut client = QueryClient::new(
        url::Url::parse("http://127.0.0.1:9/api/query").unwrap(),
        output.clone(),
    );

    let result = client.play_reply("this is *not* base64").await;
    assert!(matches!(result, Err(Error::Decode(_))));
    assert!(output.played().is_empty());
}

#[tokio::test]
async fn test_play_reply_output_failure_is_playback_error() {
    let output = MockOutput::failing();
    let mut client = QueryClient::new(
        url::Url::parse("http://127.0.0.1:9/api/query").unwrap(),
        output.clone(),
    );

    let result = client.play_reply("AAAA").await;
    assert!(matches!(result, Err(Error::Playback(_))));
    assert_eq!(output.played(), vec![3]);

    // A failed playback leaves nothing behind for the next one
    let result = client.play_reply("AAAAAAAA").await;
    assert!(matches!(result, Err(Error::Playback(_))));
    assert_eq!(output.played(), vec![3, 6]);
}

#[tokio::test]
async fn test_health_check() {
    let router = Router::new().route(
        "/health",
        get(|| async { Json(json!({ "status": "ok", "message": "Service is running" })) }),
    );
    let base = spawn_server(router).await;
    let client = QueryClient::new(query_url(&base), MockOutput::default());

    let status = client.health().await.unwrap();
    assert!(status.is_ok());
    assert_eq!(status.message, "Service is running");
}

#[tokio::test]
async fn test_upload_document_sends_file_part() {
    let received = Arc::new(Mutex::new(None::<(String, String)>));
    let received_clone = Arc::clone(&received);
    let router = Router::new().route(
        "/api/upload",
        post(move |mut multipart: Multipart| {
            let received = Arc::clone(&received_clone);
            async move {
                while let Some(field) = multipart.next_field().await.unwrap() {
                    if field.name() == Some("file") {
                        let name = field.file_name().unwrap_or_default().to_string();
                        let text = field.text().await.unwrap();
                        *received.lock().unwrap() = Some((name, text));
                    }
                }
                Json(json!({ "message": "File uploaded successfully" }))
            }
        }),
    );
    let base = spawn_server(router).await;
    let client = QueryClient::new(query_url(&base), MockOutput::default());

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.txt");
    std::fs::write(&path, "The office opens at nine.").unwrap();

    let message = client.upload_document(&path).await.unwrap();
    assert_eq!(message, "File uploaded successfully");
    assert_eq!(
        *received.lock().unwrap(),
        Some(("notes.txt".to_string(), "The office opens at nine.".to_string()))
    );
}

#[tokio::test]
async fn test_upload_rejects_non_text_documents() {
    let client = QueryClient::new(
        url::Url::parse("http://127.0.0.1:9/api/query").unwrap(),
        MockOutput::default(),
    );

    let result = client
        .upload_document(std::path::Path::new("slides.pdf"))
        .await;
    assert!(matches!(result, Err(Error::Upload(_))));
}
