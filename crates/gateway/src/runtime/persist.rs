//! Message Persister: validated appends of user and assistant turns.

use serde_json::Value;

use wc_domain::error::{Error, Result};
use wc_domain::model::{NewTurn, Principal, Role, Turn};
use wc_store::ChatStore;

/// Append a turn after validating it.
///
/// Content must be non-blank and transient "thinking" placeholders are
/// refused. User turns carry the principal; assistant turns never do.
pub async fn append(store: &dyn ChatStore, mut turn: NewTurn) -> Result<Turn> {
    if turn.thread_id.trim().is_empty() {
        return Err(Error::InvalidArgument("thread_id is required".into()));
    }
    if turn.content.trim().is_empty() {
        return Err(Error::InvalidArgument("content must not be empty".into()));
    }
    if turn.is_thinking_placeholder() {
        return Err(Error::InvalidArgument(
            "thinking placeholders are not persisted".into(),
        ));
    }
    match turn.role {
        Role::User if turn.user_id.is_none() => {
            return Err(Error::InvalidArgument("user turns require a principal".into()));
        }
        Role::Assistant => turn.user_id = None,
        Role::User => {}
    }
    store.append_turn(turn).await
}

pub async fn append_user(
    store: &dyn ChatStore,
    thread_id: &str,
    principal: &Principal,
    content: &str,
    metadata: Option<Value>,
) -> Result<Turn> {
    append(
        store,
        NewTurn {
            thread_id: thread_id.to_string(),
            role: Role::User,
            content: content.to_string(),
            user_id: Some(principal.as_str().to_string()),
            assistant_id: None,
            metadata,
        },
    )
    .await
}

pub async fn append_assistant(
    store: &dyn ChatStore,
    thread_id: &str,
    assistant_id: Option<&str>,
    content: &str,
    metadata: Option<Value>,
) -> Result<Turn> {
    append(
        store,
        NewTurn {
            thread_id: thread_id.to_string(),
            role: Role::Assistant,
            content: content.to_string(),
            user_id: None,
            assistant_id: assistant_id.map(str::to_string),
            metadata,
        },
    )
    .await
}
