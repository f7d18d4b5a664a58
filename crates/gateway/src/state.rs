use std::sync::Arc;

use sha2::{Digest, Sha256};

use wc_domain::config::Config;
use wc_providers::{AssistantsApi, TitleSummarizer};
use wc_store::{BlobStore, ChatStore};

use crate::runtime::cancel::CancelMap;

/// Shared application state threaded through all API handlers.
#[derive(Clone)]
pub struct AppState {
    // ── Core ──────────────────────────────────────────────────────────
    pub config: Arc<Config>,

    // ── Storage ───────────────────────────────────────────────────────
    pub store: Arc<dyn ChatStore>,
    pub blobs: Arc<dyn BlobStore>,

    // ── Provider ──────────────────────────────────────────────────────
    pub provider: Arc<dyn AssistantsApi>,
    pub summarizer: Arc<dyn TitleSummarizer>,

    // ── Runtime ───────────────────────────────────────────────────────
    pub cancel_map: Arc<CancelMap>,

    // ── Security (startup-computed) ───────────────────────────────────
    /// SHA-256 of the API bearer token; `None` leaves `/api/*` open.
    pub api_token_hash: Option<Vec<u8>>,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        store: Arc<dyn ChatStore>,
        blobs: Arc<dyn BlobStore>,
        provider: Arc<dyn AssistantsApi>,
        summarizer: Arc<dyn TitleSummarizer>,
    ) -> Self {
        Self {
            config,
            store,
            blobs,
            provider,
            summarizer,
            cancel_map: Arc::new(CancelMap::new()),
            api_token_hash: None,
        }
    }

    /// Require `Authorization: Bearer <token>` on `/api/*`.
    pub fn with_api_token(mut self, token: &str) -> Self {
        self.api_token_hash = Some(Sha256::digest(token.as_bytes()).to_vec());
        self
    }
}
