//! `POST /api/chat/stream`: the widget's message endpoint.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Response;
use axum::Json;
use serde::Deserialize;
use serde_json::Value;

use super::auth::Caller;
use super::error::ApiResult;
use super::stream::{self, Wire};
use crate::runtime::{self, ChatRequest};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StreamRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(default, rename = "assistantId", alias = "assistant_id")]
    pub assistant_id: String,
    /// Id of a stored attachment.
    #[serde(default, alias = "attachment_id")]
    pub filename: Option<String>,
    #[serde(default, rename = "hiddenMessage", alias = "hidden_message")]
    pub hidden_message: bool,
    #[serde(default)]
    pub context: Option<Value>,
}

/// Validation, ownership checks and setup failures come back as JSON
/// errors; once this returns `Ok` the body streams the answer.
pub async fn stream(
    State(state): State<AppState>,
    Caller(principal): Caller,
    headers: HeaderMap,
    Json(body): Json<StreamRequest>,
) -> ApiResult<Response> {
    let wire = Wire::negotiate(&headers);
    let session = runtime::start_chat(
        &state,
        ChatRequest {
            principal,
            assistant_id: body.assistant_id,
            message: body.message,
            thread_id: body.thread_id,
            attachment_id: body.filename,
            hidden: body.hidden_message,
            context: body.context,
        },
    )
    .await?;
    Ok(stream::into_response(session, wire))
}
