//! AppState construction extracted from `main.rs`.

use std::sync::Arc;

use anyhow::Context;

use wc_domain::config::{Config, ConfigSeverity};
use wc_domain::model::AssistantProfile;
use wc_providers::OpenAiAssistants;
use wc_store::{ChatStore, LocalBlobStore, SqliteChatStore};

use crate::state::AppState;

/// Validate config, open storage, connect the provider and return a
/// fully wired [`AppState`].
pub async fn build_app_state(config: Arc<Config>) -> anyhow::Result<AppState> {
    // ── Config validation ────────────────────────────────────────────
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues
                .iter()
                .filter(|i| i.severity == ConfigSeverity::Error)
                .count()
        );
    }

    // ── Storage ──────────────────────────────────────────────────────
    let store = Arc::new(
        SqliteChatStore::open(&config.storage.database_path).context("opening chat store")?,
    );
    let blobs = Arc::new(LocalBlobStore::new(config.storage.blob_root.clone()));
    tracing::info!(
        database = %config.storage.database_path.display(),
        blob_root = %config.storage.blob_root.display(),
        "storage ready"
    );

    seed_assistants(store.as_ref(), &config)
        .await
        .context("seeding assistant profiles")?;

    // ── Provider ─────────────────────────────────────────────────────
    let provider = Arc::new(
        OpenAiAssistants::from_config(&config.provider).context("initializing provider")?,
    );
    tracing::info!(
        provider = %config.provider.id,
        base_url = %config.provider.base_url,
        "provider ready"
    );

    let mut state = AppState::new(
        config.clone(),
        store,
        blobs,
        provider.clone(),
        provider,
    );

    // ── API token (read once, hash for constant-time comparison) ────
    let env_var = &config.server.api_token_env;
    match std::env::var(env_var).ok().filter(|t| !t.is_empty()) {
        Some(token) => {
            tracing::info!(source = %format!("env:{env_var}"), "API bearer-token auth enabled");
            state = state.with_api_token(&token);
        }
        None => {
            tracing::warn!("API bearer-token auth DISABLED; set the {env_var} env var to enable it");
        }
    }

    Ok(state)
}

/// Upsert every `[assistants.<id>]` profile. Provider handles already
/// stored for a profile are kept.
pub async fn seed_assistants(store: &dyn ChatStore, config: &Config) -> wc_domain::Result<()> {
    for (id, assistant) in &config.assistants {
        store
            .upsert_assistant(AssistantProfile {
                id: id.clone(),
                name: assistant.name.clone(),
                description: assistant.description.clone(),
                instructions: assistant.instructions.clone(),
                user_prompt: assistant.user_prompt.clone(),
                model: assistant.model.clone(),
                welcome_messages: assistant.welcome_messages.clone(),
                provider_assistant_id: None,
            })
            .await?;
        tracing::debug!(assistant = %id, "assistant profile seeded");
    }
    Ok(())
}
