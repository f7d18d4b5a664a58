//! Turn endpoints: list and append.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use wc_domain::error::Error;
use wc_domain::model::{NewTurn, Role};

use super::auth::Caller;
use super::error::ApiResult;
use crate::runtime::{access, persist};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default, alias = "threadId")]
    pub thread_id: String,
}

/// `GET /api/chat/messages?thread_id=`, ascending by creation.
pub async fn list(
    State(state): State<AppState>,
    Caller(principal): Caller,
    Query(q): Query<ListQuery>,
) -> ApiResult<Json<Value>> {
    let thread = access::thread(state.store.as_ref(), &principal, &q.thread_id).await?;
    let turns = state.store.list_turns(&thread.id).await?;
    Ok(Json(json!({ "messages": turns })))
}

#[derive(Debug, Deserialize)]
pub struct AppendRequest {
    #[serde(default)]
    pub content: String,
    #[serde(default, alias = "threadId")]
    pub thread_id: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default, alias = "assistantId")]
    pub assistant_id: Option<String>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

/// `POST /api/chat/messages`
pub async fn append(
    State(state): State<AppState>,
    Caller(principal): Caller,
    Json(body): Json<AppendRequest>,
) -> ApiResult<Response> {
    let role = match body.role.as_deref() {
        None => Role::User,
        Some(r) => Role::parse(r)
            .ok_or_else(|| Error::InvalidArgument(format!("unknown role: {r}")))?,
    };
    if body.content.trim().is_empty() {
        return Err(Error::InvalidArgument("content must not be empty".into()).into());
    }
    let thread = access::thread(state.store.as_ref(), &principal, &body.thread_id).await?;

    let (user_id, assistant_id) = match role {
        Role::User => (Some(principal.as_str().to_string()), body.assistant_id),
        Role::Assistant => (None, body.assistant_id.or(thread.assistant_id.clone())),
    };
    let turn = persist::append(
        state.store.as_ref(),
        NewTurn {
            thread_id: thread.id,
            role,
            content: body.content,
            user_id,
            assistant_id,
            metadata: body.metadata,
        },
    )
    .await?;
    Ok((StatusCode::CREATED, Json(turn)).into_response())
}
