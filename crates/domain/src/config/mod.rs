mod assistants;
mod auth;
mod chat;
mod observability;
mod provider;
mod server;
mod storage;

pub use assistants::*;
pub use auth::*;
pub use chat::*;
pub use observability::*;
pub use provider::*;
pub use server::*;
pub use storage::*;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
    /// Assistant profiles (key = assistant id).
    #[serde(default)]
    pub assistants: BTreeMap<String, AssistantConfig>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl ConfigError {
    fn error(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: ConfigSeverity::Error,
            field: field.into(),
            message: message.into(),
        }
    }

    fn warning(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: ConfigSeverity::Warning,
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return every issue found.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.server.port == 0 {
            errors.push(ConfigError::error("server.port", "port must be greater than 0"));
        }
        if self.server.host.is_empty() {
            errors.push(ConfigError::error("server.host", "host must not be empty"));
        }
        if self.server.max_concurrent_requests == 0 {
            errors.push(ConfigError::error(
                "server.max_concurrent_requests",
                "must be greater than 0",
            ));
        }
        if let Some(rl) = &self.server.rate_limit {
            if rl.requests_per_second == 0 || rl.burst_size == 0 {
                errors.push(ConfigError::error(
                    "server.rate_limit",
                    "requests_per_second and burst_size must be greater than 0",
                ));
            }
        }
        if self.server.cors.allowed_origins.iter().any(|o| o == "*") {
            errors.push(ConfigError::warning(
                "server.cors.allowed_origins",
                "wildcard \"*\" lets any page embed the widget",
            ));
        }

        if self.provider.base_url.is_empty() {
            errors.push(ConfigError::error("provider.base_url", "base_url must not be empty"));
        }
        if self.provider.api_key.is_some() {
            errors.push(ConfigError::warning(
                "provider.api_key",
                "plaintext API key in config; prefer provider.api_key_env",
            ));
        } else if self.provider.api_key_env.is_empty() {
            errors.push(ConfigError::error(
                "provider.api_key_env",
                "no API key source configured",
            ));
        }

        if self.chat.max_polls == 0 {
            errors.push(ConfigError::error(
                "chat.max_polls",
                "at least one status poll is required",
            ));
        }
        if self.chat.poll_interval_ms == 0 {
            errors.push(ConfigError::warning(
                "chat.poll_interval_ms",
                "zero poll interval hammers the provider",
            ));
        }
        if self.chat.title_max_chars < 8 {
            errors.push(ConfigError::error(
                "chat.title_max_chars",
                "must be at least 8",
            ));
        }

        if self.auth.widget_user_id.as_deref() == Some("") {
            errors.push(ConfigError::error(
                "auth.widget_user_id",
                "must not be empty when set",
            ));
        }
        if self.auth.principal_header.is_empty() && self.auth.widget_user_id.is_none() {
            errors.push(ConfigError::error(
                "auth",
                "no way to establish a principal: set principal_header or widget_user_id",
            ));
        }

        if self.assistants.is_empty() {
            errors.push(ConfigError::warning(
                "assistants",
                "no assistant profiles configured; only profiles already in the database are usable",
            ));
        }
        for (id, assistant) in &self.assistants {
            if assistant.name.trim().is_empty() {
                errors.push(ConfigError::error(
                    format!("assistants.{id}.name"),
                    "assistant name must not be empty",
                ));
            }
        }

        errors
    }
}
