//! # termgpt HTTP Handlers
//!
//! File: cli/src/commands/srv/handlers.rs
//! Author: Christi Mahu
//!
//! ## Overview
//!
//! Axum handlers for the web terminal and its JSON session API.
//!
//! | Method | Path                          | Result                                    |
//! |--------|-------------------------------|-------------------------------------------|
//! | GET    | `/`                           | terminal page                             |
//! | GET    | `/api/personas`               | `[{id, label, menu_name}]`                |
//! | POST   | `/api/sessions`               | `201 {session_id, persona, greeting}`     |
//! | GET    | `/api/sessions/{id}`          | `{session_id, persona, turns}`            |
//! | PUT    | `/api/sessions/{id}/persona`  | `{session_id, persona, greeting}`         |
//! | POST   | `/api/sessions/{id}/messages` | `{reply, label}`, `204` if blank          |
//! | DELETE | `/api/sessions/{id}`          | `204`                                     |
//!
//! Errors are JSON `{error, kind}`: `404` for unknown sessions, `409` while
//! another turn of the same session is running, `502` when the backend fails.
//!
use super::state::{AppState, SessionHandle};
use crate::core::inference::InferenceFailure;
use crate::core::persona::{Persona, PersonaSummary};
use crate::core::service::SendOutcome;
use crate::core::session::{Conversation, Turn};
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::MutexGuard;
use tracing::{debug, warn};
use uuid::Uuid;

/// Failure of an API call, rendered as `{error, kind}`.
#[derive(Debug)]
pub enum ApiError {
    SessionNotFound(String),
    SessionBusy,
    BadRequest(String),
    Inference(InferenceFailure),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match self {
            ApiError::SessionNotFound(id) => (
                StatusCode::NOT_FOUND,
                "session_not_found",
                format!("unknown session '{}'", id),
            ),
            ApiError::SessionBusy => (
                StatusCode::CONFLICT,
                "session_busy",
                "a message for this session is still being answered".to_string(),
            ),
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, "bad_request", message),
            ApiError::Inference(failure) => {
                (StatusCode::BAD_GATEWAY, failure.kind(), failure.to_string())
            }
        };
        (status, Json(json!({ "error": message, "kind": kind }))).into_response()
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct CreateSessionRequest {
    pub persona_id: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
pub struct SetPersonaRequest {
    pub persona_id: String,
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
pub struct MessageRequest {
    pub text: String,
}

#[derive(Serialize, Debug)]
pub struct SessionView {
    pub session_id: Uuid,
    pub persona: PersonaSummary,
    pub greeting: Option<String>,
}

#[derive(Serialize, Debug)]
pub struct TranscriptView {
    pub session_id: Uuid,
    pub persona: PersonaSummary,
    pub turns: Vec<Turn>,
}

#[derive(Serialize, Debug)]
pub struct ReplyView {
    pub reply: String,
    pub label: String,
}

fn summary(persona: &Persona) -> PersonaSummary {
    PersonaSummary {
        id: persona.id.clone(),
        label: persona.label.clone(),
        menu_name: persona.menu_name.clone(),
    }
}

fn session_view(id: Uuid, conversation: &Conversation) -> SessionView {
    let persona = conversation.active_persona();
    SessionView {
        session_id: id,
        persona: summary(persona),
        greeting: persona.greeting.clone(),
    }
}

fn parse_session_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::SessionNotFound(raw.to_string()))
}

async fn find_session(state: &AppState, raw: &str) -> Result<(Uuid, SessionHandle), ApiError> {
    let id = parse_session_id(raw)?;
    match state.session(&id).await {
        Some(handle) => Ok((id, handle)),
        None => Err(ApiError::SessionNotFound(raw.to_string())),
    }
}

fn lock_idle(handle: &SessionHandle) -> Result<MutexGuard<'_, Conversation>, ApiError> {
    handle.try_lock().map_err(|_| ApiError::SessionBusy)
}

pub async fn index(State(state): State<AppState>) -> Html<String> {
    Html(state.page().to_string())
}

pub async fn list_personas(State(state): State<AppState>) -> Json<Vec<PersonaSummary>> {
    Json(state.service.list_personas())
}

/// The body is optional; an empty body opens a session with the default persona.
pub async fn create_session(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<SessionView>), ApiError> {
    let request: CreateSessionRequest = if body.iter().all(u8::is_ascii_whitespace) {
        CreateSessionRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| ApiError::BadRequest(e.to_string()))?
    };
    let (id, handle) = state.create_session(request.persona_id.as_deref()).await;
    let conversation = handle.lock().await;
    Ok((StatusCode::CREATED, Json(session_view(id, &conversation))))
}

pub async fn get_session(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<TranscriptView>, ApiError> {
    let (id, handle) = find_session(&state, &raw_id).await?;
    let conversation = lock_idle(&handle)?;
    Ok(Json(TranscriptView {
        session_id: id,
        persona: summary(conversation.active_persona()),
        turns: conversation.snapshot().to_vec(),
    }))
}

pub async fn set_persona(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    Json(request): Json<SetPersonaRequest>,
) -> Result<Json<SessionView>, ApiError> {
    let (id, handle) = find_session(&state, &raw_id).await?;
    let mut conversation = lock_idle(&handle)?;
    state.service.set_persona(&mut conversation, &request.persona_id);
    debug!(
        "Session {} switched to persona '{}'",
        id,
        conversation.active_persona_id()
    );
    Ok(Json(session_view(id, &conversation)))
}

pub async fn post_message(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    Json(request): Json<MessageRequest>,
) -> Result<Response, ApiError> {
    let (id, handle) = find_session(&state, &raw_id).await?;
    let mut conversation = lock_idle(&handle)?;
    match state
        .service
        .send_user_message(&mut conversation, &request.text)
        .await
    {
        Ok(SendOutcome::Replied(reply)) => Ok(Json(ReplyView {
            reply: reply.text,
            label: reply.label,
        })
        .into_response()),
        Ok(SendOutcome::Ignored) => Ok(StatusCode::NO_CONTENT.into_response()),
        Err(failure) => {
            warn!("Session {} turn failed: {}", id, failure);
            Err(ApiError::Inference(failure))
        }
    }
}

pub async fn delete_session(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_session_id(&raw_id)?;
    if state.remove_session(&id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::SessionNotFound(raw_id))
    }
}
