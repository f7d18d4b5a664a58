//! Provider-side assistant resolution.
//!
//! The profile row in the store is the only record of the provider handle.
//! A missing handle, or one the provider no longer recognizes, is replaced
//! by a freshly created assistant.

use wc_domain::config::ProviderConfig;
use wc_domain::error::Result;
use wc_domain::model::AssistantProfile;
use wc_providers::{AssistantSpec, AssistantsApi};
use wc_store::ChatStore;

pub async fn provider_assistant(
    store: &dyn ChatStore,
    provider: &dyn AssistantsApi,
    cfg: &ProviderConfig,
    profile: &AssistantProfile,
) -> Result<String> {
    if let Some(handle) = profile.provider_assistant_id.as_deref() {
        if provider.assistant_exists(handle).await? {
            return Ok(handle.to_string());
        }
        tracing::warn!(
            assistant = %profile.id,
            stale_handle = handle,
            "provider no longer knows assistant, recreating"
        );
    }

    let spec = AssistantSpec {
        name: profile.name.clone(),
        instructions: profile.instructions.clone(),
        model: profile.model.clone().unwrap_or_else(|| cfg.model.clone()),
        tools: cfg.assistant_tools.clone(),
    };
    let handle = provider.create_assistant(spec).await?;
    store.set_assistant_provider_id(&profile.id, &handle).await?;
    tracing::info!(assistant = %profile.id, handle = %handle, "provider assistant linked");
    Ok(handle)
}
