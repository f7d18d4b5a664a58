//! Conversation endpoints: init snapshot, welcome provisioning, list,
//! create, rename and stop.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use wc_domain::error::Error;
use wc_domain::model::{NewThread, ThreadUpdate};

use super::auth::Caller;
use super::error::{api_error, ApiResult};
use crate::runtime::{access, threads};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct AssistantQuery {
    #[serde(default, rename = "assistantId", alias = "assistant_id")]
    pub assistant_id: Option<String>,
}

impl AssistantQuery {
    fn assistant(&self) -> Option<&str> {
        self.assistant_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

fn required<'a>(value: Option<&'a str>, field: &str) -> Result<&'a str, Error> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Error::InvalidArgument(format!("{field} is required")))
}

// ── GET /api/chat/init ───────────────────────────────────────────────

/// Threads for the assistant (most recent first) plus the turns of the
/// most recent one.
pub async fn init(
    State(state): State<AppState>,
    Caller(principal): Caller,
    Query(q): Query<AssistantQuery>,
) -> ApiResult<Json<Value>> {
    let assistant_id = required(q.assistant(), "assistantId")?;
    let threads = state
        .store
        .list_threads(principal.as_str(), Some(assistant_id))
        .await?;

    let messages = match threads.first() {
        Some(latest) => match state.store.list_turns(&latest.id).await {
            Ok(turns) => turns,
            Err(e) => {
                tracing::warn!(thread_id = %latest.id, error = %e, "failed to load turns for init");
                Vec::new()
            }
        },
        None => Vec::new(),
    };

    Ok(Json(json!({
        "thread_id": threads.first().map(|t| t.id.clone()),
        "threads": threads,
        "messages": messages,
    })))
}

// ── POST /api/chat/welcome ───────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct WelcomeRequest {
    #[serde(default, rename = "assistantId", alias = "assistant_id")]
    pub assistant_id: String,
}

pub async fn welcome(
    State(state): State<AppState>,
    Caller(principal): Caller,
    Json(body): Json<WelcomeRequest>,
) -> ApiResult<Response> {
    let assistant_id = required(Some(body.assistant_id.as_str()), "assistantId")?;
    let profile = access::assistant(state.store.as_ref(), &principal, assistant_id).await?;
    let (thread, turn) =
        threads::provision_welcome(state.store.as_ref(), &state.config.chat, &principal, &profile)
            .await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "thread": thread, "message": turn })),
    )
        .into_response())
}

// ── GET /api/chat/threads ────────────────────────────────────────────

pub async fn list(
    State(state): State<AppState>,
    Caller(principal): Caller,
    Query(q): Query<AssistantQuery>,
) -> ApiResult<Json<Value>> {
    let threads = state
        .store
        .list_threads(principal.as_str(), q.assistant())
        .await?;
    Ok(Json(json!({ "threads": threads })))
}

// ── POST /api/chat/threads ───────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct CreateThreadRequest {
    #[serde(default, rename = "assistantId", alias = "assistant_id")]
    pub assistant_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

/// Local record only; the provider handle is created on first message.
pub async fn create(
    State(state): State<AppState>,
    Caller(principal): Caller,
    Json(body): Json<CreateThreadRequest>,
) -> ApiResult<Response> {
    let assistant_id = match body.assistant_id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => {
            Some(access::assistant(state.store.as_ref(), &principal, id).await?.id)
        }
        _ => None,
    };
    let title = body
        .title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| state.config.chat.default_title.clone());

    let thread = state
        .store
        .create_thread(NewThread {
            user_id: principal.as_str().to_string(),
            assistant_id,
            title: Some(title),
            metadata: json!({}),
        })
        .await?;
    Ok((StatusCode::CREATED, Json(thread)).into_response())
}

// ── PATCH /api/chat/threads/:id ──────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RenameRequest {
    #[serde(default)]
    pub title: String,
}

pub async fn rename(
    State(state): State<AppState>,
    Caller(principal): Caller,
    Path(id): Path<String>,
    Json(body): Json<RenameRequest>,
) -> ApiResult<Response> {
    let title = body.title.trim();
    if title.is_empty() {
        return Err(Error::InvalidArgument("title must not be empty".into()).into());
    }
    let thread = access::thread(state.store.as_ref(), &principal, &id).await?;
    let updated = state
        .store
        .update_thread(
            &thread.id,
            ThreadUpdate {
                title: Some(title.to_string()),
                ..Default::default()
            },
        )
        .await?;
    tracing::info!(thread_id = %updated.id, "thread renamed");
    Ok(Json(updated).into_response())
}

// ── POST /api/chat/threads/:id/stop ──────────────────────────────────

pub async fn stop(
    State(state): State<AppState>,
    Caller(principal): Caller,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let thread = access::thread(state.store.as_ref(), &principal, &id).await?;
    if state.cancel_map.cancel(&thread.id) {
        tracing::info!(thread_id = %thread.id, "run stop requested");
        Ok(StatusCode::NO_CONTENT.into_response())
    } else {
        Ok(api_error(StatusCode::NOT_FOUND, "no run in progress"))
    }
}
