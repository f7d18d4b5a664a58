use serde::{Deserialize, Serialize};

/// An assistant profile declared in config and seeded into the store at boot.
///
/// ```toml
/// [assistants.support]
/// name = "Support"
/// instructions = "You answer questions about our product."
/// welcome_messages = ["Hi! Ask me anything about the product."]
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssistantConfig {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub user_prompt: Option<String>,
    /// Overrides `provider.model` for this assistant.
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub welcome_messages: Vec<String>,
}
