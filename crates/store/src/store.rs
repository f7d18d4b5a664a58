use wc_domain::error::Result;
use wc_domain::model::{
    AssistantProfile, Attachment, NewAttachment, NewThread, NewTurn, Thread, ThreadUpdate, Turn,
};

/// Relational store for conversations and their turns.
///
/// Lookups return `Ok(None)` for missing rows so callers can tell "absent"
/// apart from "present but owned by someone else". Mutations of rows that do
/// not exist fail with `Error::NotFound`.
#[async_trait::async_trait]
pub trait ChatStore: Send + Sync {
    async fn create_thread(&self, new: NewThread) -> Result<Thread>;

    async fn get_thread(&self, id: &str) -> Result<Option<Thread>>;

    /// Threads owned by `user_id`, most recently updated first, optionally
    /// limited to one assistant.
    async fn list_threads(&self, user_id: &str, assistant_id: Option<&str>) -> Result<Vec<Thread>>;

    /// Apply a partial update and bump `updated_at`.
    async fn update_thread(&self, id: &str, update: ThreadUpdate) -> Result<Thread>;

    /// Append a turn and bump the owning thread's `updated_at`.
    async fn append_turn(&self, new: NewTurn) -> Result<Turn>;

    /// Turns of a thread in creation order.
    async fn list_turns(&self, thread_id: &str) -> Result<Vec<Turn>>;

    async fn create_attachment(&self, new: NewAttachment) -> Result<Attachment>;

    async fn get_attachment(&self, id: &str) -> Result<Option<Attachment>>;

    /// Insert or update a profile. An existing provider handle is kept when
    /// the incoming profile carries none.
    async fn upsert_assistant(&self, profile: AssistantProfile) -> Result<()>;

    async fn get_assistant(&self, id: &str) -> Result<Option<AssistantProfile>>;

    async fn set_assistant_provider_id(&self, id: &str, provider_id: &str) -> Result<()>;
}
