use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// LLM provider (Assistants-style API)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Identifier used in logs and error messages.
    #[serde(default = "d_provider_id")]
    pub id: String,
    #[serde(default = "d_base_url")]
    pub base_url: String,
    /// Environment variable holding the API key.
    #[serde(default = "d_api_key_env")]
    pub api_key_env: String,
    /// Plaintext key. Prefer `api_key_env`; a warning is logged when set.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Model for newly created provider assistants.
    #[serde(default = "d_model")]
    pub model: String,
    /// Model used for conversation title summaries.
    #[serde(default = "d_summary_model")]
    pub summary_model: String,
    /// Tools enabled on newly created provider assistants.
    #[serde(default = "d_tools")]
    pub assistant_tools: Vec<String>,
    #[serde(default = "d_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            id: d_provider_id(),
            base_url: d_base_url(),
            api_key_env: d_api_key_env(),
            api_key: None,
            model: d_model(),
            summary_model: d_summary_model(),
            assistant_tools: d_tools(),
            request_timeout_secs: d_timeout(),
        }
    }
}

fn d_provider_id() -> String {
    "openai".into()
}
fn d_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn d_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn d_model() -> String {
    "gpt-4o".into()
}
fn d_summary_model() -> String {
    "gpt-4o-mini".into()
}
fn d_tools() -> Vec<String> {
    vec!["code_interpreter".into()]
}
fn d_timeout() -> u64 {
    120
}
