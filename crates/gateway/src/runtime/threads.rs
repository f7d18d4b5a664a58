//! Thread Resolver: maps a request to a local thread and its provider handle.

use serde_json::json;

use wc_domain::config::ChatConfig;
use wc_domain::error::Result;
use wc_domain::model::{
    AssistantProfile, NewThread, Principal, Thread, ThreadUpdate, Turn, PROVIDER_THREAD_KEY,
};
use wc_providers::AssistantsApi;
use wc_store::ChatStore;

use super::{access, persist};

#[derive(Debug, Clone)]
pub struct ResolvedThread {
    pub thread: Thread,
    /// Provider conversation handle.
    pub handle: String,
    /// True when the local thread was created by this call.
    pub created: bool,
}

/// Resolve `existing` (after the ownership check) or create a new thread.
///
/// An existing thread without a provider handle gets one created lazily; a
/// failure to store the backfilled handle is logged and the run proceeds.
pub async fn resolve(
    store: &dyn ChatStore,
    provider: &dyn AssistantsApi,
    chat: &ChatConfig,
    principal: &Principal,
    assistant_id: &str,
    existing: Option<&str>,
) -> Result<ResolvedThread> {
    if let Some(id) = existing.map(str::trim).filter(|id| !id.is_empty()) {
        let thread = access::thread(store, principal, id).await?;
        if let Some(handle) = thread.provider_handle() {
            let handle = handle.to_string();
            return Ok(ResolvedThread {
                thread,
                handle,
                created: false,
            });
        }
        return backfill(store, provider, thread).await;
    }

    let handle = provider.create_thread().await?;
    let new = NewThread {
        user_id: principal.as_str().to_string(),
        assistant_id: Some(assistant_id.to_string()),
        title: Some(chat.default_title.clone()),
        metadata: json!({ PROVIDER_THREAD_KEY: handle }),
    };
    let thread = match store.create_thread(new).await {
        Ok(thread) => thread,
        Err(e) => {
            tracing::warn!(
                orphaned_handle = %handle,
                error = %e,
                "local thread insert failed after provider thread was created"
            );
            return Err(e);
        }
    };
    tracing::info!(thread_id = %thread.id, handle = %handle, "thread created");
    Ok(ResolvedThread {
        thread,
        handle,
        created: true,
    })
}

async fn backfill(
    store: &dyn ChatStore,
    provider: &dyn AssistantsApi,
    mut thread: Thread,
) -> Result<ResolvedThread> {
    let handle = provider.create_thread().await?;
    let metadata = thread.metadata_with_handle(&handle);
    let update = ThreadUpdate {
        metadata: Some(metadata.clone()),
        ..Default::default()
    };
    match store.update_thread(&thread.id, update).await {
        Ok(updated) => thread = updated,
        Err(e) => {
            tracing::warn!(
                thread_id = %thread.id,
                handle = %handle,
                error = %e,
                "failed to persist backfilled provider handle; continuing"
            );
            thread.metadata = metadata;
        }
    }
    tracing::info!(thread_id = %thread.id, handle = %handle, "provider handle backfilled");
    Ok(ResolvedThread {
        thread,
        handle,
        created: false,
    })
}

/// Create a thread seeded with one assistant welcome turn.
///
/// No provider conversation is created here; [`resolve`] backfills the
/// handle on first use.
pub async fn provision_welcome(
    store: &dyn ChatStore,
    chat: &ChatConfig,
    principal: &Principal,
    profile: &AssistantProfile,
) -> Result<(Thread, Turn)> {
    let greeting = profile
        .welcome_messages
        .iter()
        .map(|m| m.trim())
        .find(|m| !m.is_empty())
        .unwrap_or(chat.welcome_message.as_str())
        .to_string();

    let thread = store
        .create_thread(NewThread {
            user_id: principal.as_str().to_string(),
            assistant_id: Some(profile.id.clone()),
            title: Some(chat.default_title.clone()),
            metadata: json!({}),
        })
        .await?;
    let turn =
        persist::append_assistant(store, &thread.id, Some(&profile.id), &greeting, None).await?;
    tracing::info!(thread_id = %thread.id, assistant = %profile.id, "welcome thread provisioned");
    Ok((thread, turn))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use std::sync::atomic::Ordering;
    use wc_domain::error::Error;
    use wc_providers::ScriptedProvider;
    use wc_store::SqliteChatStore;

    fn alice() -> Principal {
        Principal::new("alice")
    }

    #[tokio::test]
    async fn creates_remote_then_local() {
        let store = SqliteChatStore::in_memory().unwrap();
        let provider = ScriptedProvider::new();
        let chat = ChatConfig::default();

        let resolved = resolve(&store, &provider, &chat, &alice(), "a1", None)
            .await
            .unwrap();
        assert!(resolved.created);
        assert_eq!(resolved.thread.provider_handle(), Some(resolved.handle.as_str()));
        assert_eq!(resolved.thread.title.as_deref(), Some("New Chat"));

        let stored = store.get_thread(&resolved.thread.id).await.unwrap().unwrap();
        assert_eq!(stored.user_id, "alice");
        assert_eq!(stored.assistant_id.as_deref(), Some("a1"));
    }

    #[tokio::test]
    async fn existing_thread_reuses_handle() {
        let store = SqliteChatStore::in_memory().unwrap();
        let provider = ScriptedProvider::new();
        let chat = ChatConfig::default();
        let first = resolve(&store, &provider, &chat, &alice(), "a1", None).await.unwrap();

        let again = resolve(&store, &provider, &chat, &alice(), "a1", Some(&first.thread.id))
            .await
            .unwrap();
        assert!(!again.created);
        assert_eq!(again.handle, first.handle);
        assert_eq!(provider.calls.create_thread.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_handle_is_backfilled() {
        let store = SqliteChatStore::in_memory().unwrap();
        let provider = ScriptedProvider::new();
        let local = store
            .create_thread(NewThread {
                user_id: "alice".into(),
                assistant_id: Some("a1".into()),
                title: Some("Welcome".into()),
                metadata: Value::Null,
            })
            .await
            .unwrap();

        let resolved = resolve(&store, &provider, &ChatConfig::default(), &alice(), "a1", Some(&local.id))
            .await
            .unwrap();
        assert!(!resolved.created);
        let stored = store.get_thread(&local.id).await.unwrap().unwrap();
        assert_eq!(stored.provider_handle(), Some(resolved.handle.as_str()));
        assert_eq!(stored.title.as_deref(), Some("Welcome"));
    }

    #[tokio::test]
    async fn foreign_thread_is_denied_before_provider_calls() {
        let store = SqliteChatStore::in_memory().unwrap();
        let provider = ScriptedProvider::new();
        let chat = ChatConfig::default();
        let theirs = resolve(&store, &provider, &chat, &Principal::new("bob"), "a1", None)
            .await
            .unwrap();
        let calls_before = provider.calls.total();

        let err = resolve(&store, &provider, &chat, &alice(), "a1", Some(&theirs.thread.id))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AccessDenied { .. }));
        assert_eq!(provider.calls.total(), calls_before);
    }

    fn profile(welcome: &[&str]) -> AssistantProfile {
        AssistantProfile {
            id: "a1".into(),
            name: "Support".into(),
            description: None,
            instructions: None,
            user_prompt: None,
            model: None,
            welcome_messages: welcome.iter().map(|s| s.to_string()).collect(),
            provider_assistant_id: None,
        }
    }

    #[tokio::test]
    async fn welcome_seeds_exactly_one_assistant_turn() {
        let store = SqliteChatStore::in_memory().unwrap();
        let (thread, turn) = provision_welcome(
            &store,
            &ChatConfig::default(),
            &alice(),
            &profile(&["", "Hi, ask me about your data."]),
        )
        .await
        .unwrap();

        let turns = store.list_turns(&thread.id).await.unwrap();
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].id, turn.id);
        assert_eq!(turns[0].content, "Hi, ask me about your data.");
        assert_eq!(turns[0].user_id, None);
        assert_eq!(thread.provider_handle(), None);
    }

    #[tokio::test]
    async fn welcome_uses_configured_default() {
        let store = SqliteChatStore::in_memory().unwrap();
        let chat = ChatConfig::default();
        let (_, turn) = provision_welcome(&store, &chat, &alice(), &profile(&[]))
            .await
            .unwrap();
        assert_eq!(turn.content, chat.welcome_message);
    }

    #[tokio::test]
    async fn provider_failure_creates_no_local_thread() {
        let store = SqliteChatStore::in_memory().unwrap();
        let provider = ScriptedProvider::new().failing_thread_creation();

        let err = resolve(&store, &provider, &ChatConfig::default(), &alice(), "a1", None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Provider { .. }));
        assert!(store.list_threads("alice", None).await.unwrap().is_empty());
    }
}
