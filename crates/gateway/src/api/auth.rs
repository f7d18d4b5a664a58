//! API authentication middleware and caller identity.
//!
//! The bearer token is read from the env var named by
//! `config.server.api_token_env` **once at startup** and cached as a
//! SHA-256 digest in `AppState`. With no token configured the `/api/*`
//! routes are open (dev mode).
//!
//! The principal that owns threads and attachments is taken from the
//! `auth.principal_header` request header, falling back to the configured
//! `auth.widget_user_id`.

use axum::body::Body;
use axum::extract::{FromRequestParts, State};
use axum::http::request::Parts;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use wc_domain::error::Error;
use wc_domain::model::Principal;

use super::error::{api_error, ApiError};
use crate::state::AppState;

/// Axum middleware that enforces bearer-token authentication on protected
/// routes. Attach via `axum::middleware::from_fn_with_state`.
pub async fn require_api_token(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let Some(expected_hash) = &state.api_token_hash else {
        return next.run(req).await;
    };

    let provided = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or("");

    // Compare fixed-length digests so the token length does not leak.
    let provided_hash = Sha256::digest(provided.as_bytes());
    if !bool::from(provided_hash.ct_eq(expected_hash.as_slice())) {
        return api_error(StatusCode::UNAUTHORIZED, "invalid or missing API token");
    }

    next.run(req).await
}

/// The authenticated principal of a request.
#[derive(Debug, Clone)]
pub struct Caller(pub Principal);

#[axum::async_trait]
impl FromRequestParts<AppState> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth = &state.config.auth;
        let from_header = parts
            .headers
            .get(auth.principal_header.as_str())
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty());

        match from_header.or(auth.widget_user_id.as_deref()) {
            Some(id) => Ok(Caller(Principal::new(id))),
            None => Err(ApiError(Error::Unauthorized(format!(
                "missing {} header",
                auth.principal_header
            )))),
        }
    }
}
