//! # termgpt Inference Client
//!
//! File: cli/src/core/inference.rs
//! Author: Christi Mahu
//!
//! ## Overview
//!
//! Adapter between a conversation transcript and the language-model server.
//! The `ChatBackend` trait is the seam the rest of the crate talks to;
//! `OllamaClient` is the production implementation for Ollama's `/api/chat`
//! endpoint, always called in full-response mode (`"stream": false`).
//!
//! ## Failure model
//!
//! A call never returns an `anyhow` error. Every outcome is an
//! `InferenceResult`: either the raw reply text (unfiltered) or one of four
//! `InferenceFailure` kinds:
//!
//! | kind                 | cause                                               |
//! |----------------------|-----------------------------------------------------|
//! | `backend_unreachable`| connect failure or timeout                          |
//! | `backend_error`      | non-2xx HTTP status                                 |
//! | `empty_reply`        | `message` / `message.content` missing or empty      |
//! | `malformed_response` | body is not JSON or has the wrong shape             |
//!
//! There are no retries: one request per call. The caller decides whether to
//! show the error or let the user resend.
//!
//! ## Wire format
//!
//! ```json
//! // request
//! { "model": "llama3.2", "messages": [{"role": "system", "content": "..."}], "stream": false }
//! // response
//! { "message": { "role": "assistant", "content": "Hi there!" }, "done": true }
//! ```
//!
use crate::core::config::BackendConfig;
use crate::core::error::{RelayError, Result};
use crate::core::session::Turn;
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Longest slice of an error body kept in `BackendError`.
const MAX_ERROR_BODY: usize = 300;

/// Why a completion did not produce a reply.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InferenceFailure {
    #[error("backend unreachable: {0}")]
    BackendUnreachable(String),

    #[error("backend returned HTTP {status}: {body}")]
    BackendError { status: u16, body: String },

    #[error("backend returned an empty reply")]
    EmptyReply,

    #[error("malformed backend response: {0}")]
    MalformedResponse(String),
}

impl InferenceFailure {
    /// Stable machine-readable tag.
    pub fn kind(&self) -> &'static str {
        match self {
            InferenceFailure::BackendUnreachable(_) => "backend_unreachable",
            InferenceFailure::BackendError { .. } => "backend_error",
            InferenceFailure::EmptyReply => "empty_reply",
            InferenceFailure::MalformedResponse(_) => "malformed_response",
        }
    }
}

/// Raw reply text or the reason there is none.
pub type InferenceResult = std::result::Result<String, InferenceFailure>;

/// Something that turns a transcript into the next assistant reply.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn complete(&self, transcript: &[Turn]) -> InferenceResult;
}

#[derive(Serialize, Debug)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    stream: bool,
}

#[derive(Serialize, Debug)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

impl<'a> From<&'a Turn> for WireMessage<'a> {
    fn from(turn: &'a Turn) -> Self {
        Self {
            role: turn.role.as_str(),
            content: &turn.text,
        }
    }
}

/// Client for Ollama's chat endpoint.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: Client,
    url: Url,
    model: String,
}

impl OllamaClient {
    pub fn new(url: &str, model: impl Into<String>, timeout: Duration) -> Result<Self> {
        let url = Url::parse(url).map_err(|e| {
            RelayError::Config(format!("Invalid backend URL '{}': {}", url, e))
        })?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(RelayError::from)?;
        Ok(Self {
            client,
            url,
            model: model.into(),
        })
    }

    pub fn from_config(config: &BackendConfig) -> Result<Self> {
        info!(
            "Using inference backend {} with model '{}' (timeout {}s)",
            config.url, config.model, config.timeout_secs
        );
        Self::new(
            &config.url,
            config.model.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl ChatBackend for OllamaClient {
    async fn complete(&self, transcript: &[Turn]) -> InferenceResult {
        let request = ChatRequest {
            model: &self.model,
            messages: transcript.iter().map(WireMessage::from).collect(),
            stream: false,
        };
        debug!(
            "POST {} with {} messages (model '{}')",
            self.url,
            request.messages.len(),
            self.model
        );

        let response = match self.client.post(self.url.clone()).json(&request).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!("Inference request failed: {}", error_chain(&e));
                return Err(InferenceFailure::BackendUnreachable(error_chain(&e)));
            }
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                warn!("Failed to read inference response body: {}", error_chain(&e));
                return Err(InferenceFailure::BackendUnreachable(error_chain(&e)));
            }
        };

        if !status.is_success() {
            warn!("Inference backend returned HTTP {}", status);
            return Err(InferenceFailure::BackendError {
                status: status.as_u16(),
                body: truncate(body.trim(), MAX_ERROR_BODY),
            });
        }

        parse_reply(&body)
    }
}

/// Extracts `message.content` from a chat response body.
pub fn parse_reply(body: &str) -> InferenceResult {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| InferenceFailure::MalformedResponse(format!("invalid JSON: {}", e)))?;

    let Value::Object(root) = value else {
        return Err(InferenceFailure::MalformedResponse(
            "top-level value is not an object".into(),
        ));
    };

    let message = match root.get("message") {
        None | Some(Value::Null) => return Err(InferenceFailure::EmptyReply),
        Some(Value::Object(message)) => message,
        Some(_) => {
            return Err(InferenceFailure::MalformedResponse(
                "'message' is not an object".into(),
            ))
        }
    };

    match message.get("content") {
        None | Some(Value::Null) => Err(InferenceFailure::EmptyReply),
        Some(Value::String(content)) if content.is_empty() => Err(InferenceFailure::EmptyReply),
        Some(Value::String(content)) => Ok(content.clone()),
        Some(_) => Err(InferenceFailure::MalformedResponse(
            "'message.content' is not a string".into(),
        )),
    }
}

fn error_chain(err: &dyn std::error::Error) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::post, Json, Router};
    use serde_json::json;
    use tokio::net::TcpListener;

    /// Serves `router` on an ephemeral local port and returns the chat URL.
    async fn spawn_stub(router: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/api/chat", addr)
    }

    fn transcript() -> Vec<Turn> {
        vec![Turn::system("Be helpful."), Turn::user("hello")]
    }

    #[test]
    fn test_parse_reply_success() {
        let body = r#"{"model":"llama3.2","message":{"role":"assistant","content":"Hi there!"},"done":true}"#;
        assert_eq!(parse_reply(body), Ok("Hi there!".to_string()));
    }

    #[test]
    fn test_parse_reply_missing_content_is_empty_reply() {
        assert_eq!(parse_reply(r#"{"message":{}}"#), Err(InferenceFailure::EmptyReply));
        assert_eq!(parse_reply(r#"{"done":true}"#), Err(InferenceFailure::EmptyReply));
        assert_eq!(
            parse_reply(r#"{"message":{"content":""}}"#),
            Err(InferenceFailure::EmptyReply)
        );
        assert_eq!(
            parse_reply(r#"{"message":{"content":null}}"#),
            Err(InferenceFailure::EmptyReply)
        );
    }

    #[test]
    fn test_parse_reply_malformed_shapes() {
        for body in ["not json", "[1,2]", r#"{"message":"text"}"#, r#"{"message":{"content":42}}"#] {
            let err = parse_reply(body).unwrap_err();
            assert_eq!(err.kind(), "malformed_response", "body {}", body);
        }
    }

    #[test]
    fn test_failure_kinds_and_display() {
        let err = InferenceFailure::BackendError {
            status: 500,
            body: "boom".into(),
        };
        assert_eq!(err.kind(), "backend_error");
        assert_eq!(err.to_string(), "backend returned HTTP 500: boom");
        assert_eq!(InferenceFailure::EmptyReply.kind(), "empty_reply");
        assert_eq!(
            InferenceFailure::BackendUnreachable("refused".into()).to_string(),
            "backend unreachable: refused"
        );
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("ééééé", 2), "éé...");
    }

    #[test]
    fn test_new_rejects_bad_url() {
        let err = OllamaClient::new("not a url", "llama3.2", Duration::from_secs(1)).unwrap_err();
        assert!(err.to_string().contains("Invalid backend URL"));
    }

    #[tokio::test]
    async fn test_complete_sends_full_transcript() {
        let router = Router::new().route(
            "/api/chat",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["model"], "llama3.2");
                assert_eq!(body["stream"], false);
                assert_eq!(
                    body["messages"],
                    json!([
                        {"role": "system", "content": "Be helpful."},
                        {"role": "user", "content": "hello"}
                    ])
                );
                Json(json!({"message": {"role": "assistant", "content": "Hi there!"}}))
            }),
        );
        let url = spawn_stub(router).await;
        let client = OllamaClient::new(&url, "llama3.2", Duration::from_secs(5)).unwrap();

        assert_eq!(client.complete(&transcript()).await, Ok("Hi there!".to_string()));
    }

    #[tokio::test]
    async fn test_complete_http_error_status() {
        let router = Router::new().route(
            "/api/chat",
            post(|| async { (StatusCode::NOT_FOUND, "model 'llama3.2' not found") }),
        );
        let url = spawn_stub(router).await;
        let client = OllamaClient::new(&url, "llama3.2", Duration::from_secs(5)).unwrap();

        let err = client.complete(&transcript()).await.unwrap_err();
        assert_eq!(
            err,
            InferenceFailure::BackendError {
                status: 404,
                body: "model 'llama3.2' not found".into()
            }
        );
    }

    #[tokio::test]
    async fn test_complete_empty_message_object() {
        let router = Router::new().route(
            "/api/chat",
            post(|| async { Json(json!({"message": {}})) }),
        );
        let url = spawn_stub(router).await;
        let client = OllamaClient::new(&url, "llama3.2", Duration::from_secs(5)).unwrap();

        assert_eq!(
            client.complete(&transcript()).await,
            Err(InferenceFailure::EmptyReply)
        );
    }

    #[tokio::test]
    async fn test_complete_non_json_body() {
        let router = Router::new().route("/api/chat", post(|| async { "<html>proxy</html>" }));
        let url = spawn_stub(router).await;
        let client = OllamaClient::new(&url, "llama3.2", Duration::from_secs(5)).unwrap();

        let err = client.complete(&transcript()).await.unwrap_err();
        assert_eq!(err.kind(), "malformed_response");
    }

    #[tokio::test]
    async fn test_complete_timeout_is_unreachable() {
        let router = Router::new().route(
            "/api/chat",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(json!({"message": {"content": "too late"}}))
            }),
        );
        let url = spawn_stub(router).await;
        let client = OllamaClient::new(&url, "llama3.2", Duration::from_millis(200)).unwrap();

        let err = client.complete(&transcript()).await.unwrap_err();
        assert_eq!(err.kind(), "backend_unreachable");
    }

    #[tokio::test]
    async fn test_complete_connection_refused_is_unreachable() {
        // Reserve a port, then free it so nothing is listening there.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let url = format!("http://127.0.0.1:{}/api/chat", port);
        let client = OllamaClient::new(&url, "llama3.2", Duration::from_secs(2)).unwrap();

        let err = client.complete(&transcript()).await.unwrap_err();
        assert_eq!(err.kind(), "backend_unreachable");
    }
}
