//! Persisted data model: conversations (threads), turns, attachments and
//! assistant profiles, plus the caller identity they are scoped to.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Metadata key under which a thread stores its provider conversation handle.
pub const PROVIDER_THREAD_KEY: &str = "provider_thread_id";

/// Metadata key that marks a transient "thinking" placeholder turn.
pub const THINKING_KEY: &str = "thinking";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Identity
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The authenticated caller every resource is scoped to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Principal(String);

impl Principal {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn owns(&self, owner: &str) -> bool {
        self.0 == owner
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kinds of resource that go through the authorization gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Thread,
    Attachment,
    Assistant,
}

impl ResourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Thread => "thread",
            Self::Attachment => "attachment",
            Self::Assistant => "assistant",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Threads
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A locally persisted conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    pub id: String,
    pub user_id: String,
    pub assistant_id: Option<String>,
    pub title: Option<String>,
    /// Free-form JSON object; carries the provider conversation handle.
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Thread {
    /// The provider conversation handle, once one has been linked.
    pub fn provider_handle(&self) -> Option<&str> {
        self.metadata
            .get(PROVIDER_THREAD_KEY)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Metadata with the provider handle set, other keys preserved.
    pub fn metadata_with_handle(&self, handle: &str) -> Value {
        let mut meta = match &self.metadata {
            Value::Object(map) => map.clone(),
            _ => serde_json::Map::new(),
        };
        meta.insert(PROVIDER_THREAD_KEY.into(), Value::String(handle.into()));
        Value::Object(meta)
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewThread {
    pub user_id: String,
    pub assistant_id: Option<String>,
    pub title: Option<String>,
    pub metadata: Value,
}

/// Partial update; `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct ThreadUpdate {
    pub title: Option<String>,
    pub metadata: Option<Value>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Turns
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub id: String,
    pub thread_id: String,
    pub role: Role,
    pub content: String,
    /// Set for user turns only.
    pub user_id: Option<String>,
    pub assistant_id: Option<String>,
    pub metadata: Option<Value>,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTurn {
    pub thread_id: String,
    pub role: Role,
    pub content: String,
    pub user_id: Option<String>,
    pub assistant_id: Option<String>,
    pub metadata: Option<Value>,
}

impl NewTurn {
    pub fn is_thinking_placeholder(&self) -> bool {
        self.metadata
            .as_ref()
            .and_then(|m| m.get(THINKING_KEY))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Attachments
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A previously uploaded file record; the bytes live in blob storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: String,
    pub user_id: String,
    pub filename: String,
    pub storage_path: String,
    pub mime_type: Option<String>,
    pub size_bytes: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAttachment {
    pub user_id: String,
    pub filename: String,
    pub storage_path: String,
    pub mime_type: Option<String>,
    pub size_bytes: Option<i64>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Assistants
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// An assistant profile the widget can be configured to talk to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantProfile {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// System instructions given to the provider assistant.
    #[serde(default)]
    pub instructions: Option<String>,
    /// Prefix prepended to every user message before submission.
    #[serde(default)]
    pub user_prompt: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub welcome_messages: Vec<String>,
    /// Handle of the provider-side assistant, once created.
    #[serde(default)]
    pub provider_assistant_id: Option<String>,
}
