pub mod auth;
pub mod chat;
pub mod error;
pub mod messages;
pub mod stream;
pub mod threads;

use axum::middleware;
use axum::routing::{get, patch, post};
use axum::{Json, Router};

use crate::state::AppState;

/// Build the full API router.
///
/// Routes are split into **public** (no auth required) and **protected**
/// (gated behind the `WC_API_TOKEN` bearer-token middleware). Every
/// protected handler also resolves the caller's principal.
pub fn router(state: AppState) -> Router<AppState> {
    let public = Router::new().route("/health", get(health));

    let protected = Router::new()
        // Streaming chat
        .route("/api/chat/stream", post(chat::stream))
        // Conversations
        .route("/api/chat/init", get(threads::init))
        .route("/api/chat/welcome", post(threads::welcome))
        .route("/api/chat/threads", get(threads::list).post(threads::create))
        .route("/api/chat/threads/:id", patch(threads::rename))
        .route("/api/chat/threads/:id/stop", post(threads::stop))
        // Turns
        .route("/api/chat/messages", get(messages::list).post(messages::append))
        .route_layer(middleware::from_fn_with_state(
            state,
            auth::require_api_token,
        ));

    public.merge(protected)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
