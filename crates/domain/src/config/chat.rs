use std::time::Duration;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Chat runtime
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Delay before each run status query.
    #[serde(default = "d_poll_interval")]
    pub poll_interval_ms: u64,
    /// Status queries before the run is abandoned as timed out.
    #[serde(default = "d_max_polls")]
    pub max_polls: u32,
    /// Pause between streamed word chunks.
    #[serde(default = "d_chunk_delay")]
    pub chunk_delay_ms: u64,
    /// Upper bound on generated conversation titles, before the ellipsis.
    #[serde(default = "d_title_max")]
    pub title_max_chars: usize,
    /// Titles considered placeholders and eligible for replacement.
    #[serde(default = "d_placeholder_titles")]
    pub placeholder_titles: Vec<String>,
    /// Title given to threads created without one.
    #[serde(default = "d_default_title")]
    pub default_title: String,
    /// Greeting used when an assistant profile has no welcome message.
    #[serde(default = "d_welcome")]
    pub welcome_message: String,
    /// Prefix applied to user messages when the assistant has no
    /// `user_prompt` of its own.
    #[serde(default)]
    pub system_prompt: Option<String>,
    /// Label introducing the serialized `context` block.
    #[serde(default = "d_context_label")]
    pub context_label: String,
    /// How many provider messages to fetch when picking the run output.
    #[serde(default = "d_list_limit")]
    pub list_messages_limit: u32,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: d_poll_interval(),
            max_polls: d_max_polls(),
            chunk_delay_ms: d_chunk_delay(),
            title_max_chars: d_title_max(),
            placeholder_titles: d_placeholder_titles(),
            default_title: d_default_title(),
            welcome_message: d_welcome(),
            system_prompt: None,
            context_label: d_context_label(),
            list_messages_limit: d_list_limit(),
        }
    }
}

impl ChatConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn chunk_delay(&self) -> Duration {
        Duration::from_millis(self.chunk_delay_ms)
    }

    pub fn is_placeholder_title(&self, title: &str) -> bool {
        let title = title.trim();
        title.is_empty()
            || title == self.default_title
            || self.placeholder_titles.iter().any(|p| p == title)
    }
}

fn d_poll_interval() -> u64 {
    1500
}
fn d_max_polls() -> u32 {
    30
}
fn d_chunk_delay() -> u64 {
    40
}
fn d_title_max() -> usize {
    70
}
fn d_placeholder_titles() -> Vec<String> {
    vec!["New Chat".into(), "New conversation".into()]
}
fn d_default_title() -> String {
    "New Chat".into()
}
fn d_welcome() -> String {
    "Hello! How can I help you today?".into()
}
fn d_context_label() -> String {
    "Data for context".into()
}
fn d_list_limit() -> u32 {
    20
}
