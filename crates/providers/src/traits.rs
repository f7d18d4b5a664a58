use serde::{Deserialize, Serialize};
use wc_domain::error::Result;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Wire-level types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Status of a provider-side run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    Cancelling,
    RequiresAction,
    Completed,
    Failed,
    Cancelled,
    Expired,
    Incomplete,
    #[serde(other)]
    Unknown,
}

impl RunStatus {
    /// Still running; keep polling.
    pub fn is_pending(self) -> bool {
        matches!(self, Self::Queued | Self::InProgress | Self::Cancelling)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::InProgress => "in_progress",
            Self::Cancelling => "cancelling",
            Self::RequiresAction => "requires_action",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
            Self::Incomplete => "incomplete",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunError {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderRun {
    pub id: String,
    pub status: RunStatus,
    #[serde(default)]
    pub last_error: Option<RunError>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextValue {
    pub value: String,
}

/// One content part of a provider message. Only text is consumed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: TextValue },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderMessage {
    pub id: String,
    pub role: String,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub run_id: Option<String>,
    #[serde(default)]
    pub content: Vec<ContentPart>,
}

impl ProviderMessage {
    pub fn is_assistant(&self) -> bool {
        self.role == "assistant"
    }

    /// The first text part, if any.
    pub fn first_text(&self) -> Option<&str> {
        self.content.iter().find_map(|part| match part {
            ContentPart::Text { text } => Some(text.value.as_str()),
            ContentPart::Other => None,
        })
    }
}

/// A user message appended to a provider conversation.
#[derive(Debug, Clone, Default)]
pub struct OutgoingMessage {
    pub content: String,
    /// Provider file handles attached for the code interpreter tool.
    pub file_ids: Vec<String>,
}

/// Raw bytes to upload to the provider's file store.
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub filename: String,
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Parameters for a provider-side assistant.
#[derive(Debug, Clone, Default)]
pub struct AssistantSpec {
    pub name: String,
    pub instructions: Option<String>,
    pub model: String,
    pub tools: Vec<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Provider traits
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A hosted conversation API with server-side threads and asynchronous runs.
///
/// All identifiers are opaque provider handles.
#[async_trait::async_trait]
pub trait AssistantsApi: Send + Sync {
    /// Create an empty remote conversation and return its handle.
    async fn create_thread(&self) -> Result<String>;

    /// Append a user message to a remote conversation.
    async fn create_message(&self, thread: &str, message: OutgoingMessage) -> Result<String>;

    /// Start an asynchronous run of `assistant` on `thread`.
    async fn start_run(&self, thread: &str, assistant: &str) -> Result<ProviderRun>;

    async fn get_run(&self, thread: &str, run: &str) -> Result<ProviderRun>;

    async fn cancel_run(&self, thread: &str, run: &str) -> Result<()>;

    /// Messages of a conversation, newest first.
    async fn list_messages(&self, thread: &str, limit: u32) -> Result<Vec<ProviderMessage>>;

    /// Upload a file and return its provider handle.
    async fn upload_file(&self, file: FileUpload) -> Result<String>;

    async fn create_assistant(&self, spec: AssistantSpec) -> Result<String>;

    /// `Ok(false)` when the provider no longer knows the assistant.
    async fn assistant_exists(&self, assistant: &str) -> Result<bool>;
}

/// One-shot summarization used for conversation titles.
#[async_trait::async_trait]
pub trait TitleSummarizer: Send + Sync {
    async fn summarize_title(&self, text: &str, max_chars: usize) -> Result<String>;
}
