//! OpenAI Assistants v2 adapter.
//!
//! Threads, messages, runs, files and assistants live on the provider. The
//! same client also serves title summaries through chat completions.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::traits::{
    AssistantSpec, AssistantsApi, FileUpload, OutgoingMessage, ProviderMessage, ProviderRun,
    TitleSummarizer,
};
use crate::util::{from_reqwest, read_body, resolve_api_key};
use wc_domain::config::ProviderConfig;
use wc_domain::error::{Error, Result};

const BETA_HEADER: &str = "OpenAI-Beta";
const BETA_VALUE: &str = "assistants=v2";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Adapter struct
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct OpenAiAssistants {
    id: String,
    base_url: String,
    api_key: String,
    summary_model: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct IdOnly {
    id: String,
}

#[derive(Deserialize)]
struct MessageList {
    #[serde(default)]
    data: Vec<ProviderMessage>,
}

impl OpenAiAssistants {
    /// Build the adapter from config, reading the API key from the environment.
    pub fn from_config(cfg: &ProviderConfig) -> Result<Self> {
        let api_key = resolve_api_key(cfg)?;
        Self::with_key(cfg, api_key)
    }

    pub fn with_key(cfg: &ProviderConfig, api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.request_timeout_secs))
            .build()
            .map_err(from_reqwest)?;

        Ok(Self {
            id: cfg.id.clone(),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key,
            summary_model: cfg.summary_model.clone(),
            client,
        })
    }

    // ── Internal: authenticated request builders ───────────────────

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .bearer_auth(&self.api_key)
            .header(BETA_HEADER, BETA_VALUE)
    }

    async fn post_json<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T> {
        let resp = self
            .authed(self.client.post(self.url(path)))
            .json(body)
            .send()
            .await
            .map_err(from_reqwest)?;
        let text = read_body(&self.id, resp).await?;
        Ok(serde_json::from_str(&text)?)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let resp = self
            .authed(self.client.get(self.url(path)))
            .send()
            .await
            .map_err(from_reqwest)?;
        let text = read_body(&self.id, resp).await?;
        Ok(serde_json::from_str(&text)?)
    }
}

fn message_body(message: &OutgoingMessage) -> Value {
    let mut body = json!({
        "role": "user",
        "content": message.content,
    });
    if !message.file_ids.is_empty() {
        let attachments: Vec<Value> = message
            .file_ids
            .iter()
            .map(|id| json!({ "file_id": id, "tools": [{ "type": "code_interpreter" }] }))
            .collect();
        body["attachments"] = Value::Array(attachments);
    }
    body
}

fn title_prompt(max_chars: usize) -> String {
    format!(
        "Write a short title for a conversation that starts with the message below. \
         Use at most {max_chars} characters. Reply with the title only, no quotes."
    )
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait implementations
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
impl AssistantsApi for OpenAiAssistants {
    async fn create_thread(&self) -> Result<String> {
        let created: IdOnly = self.post_json("/threads", &json!({})).await?;
        tracing::debug!(provider = %self.id, thread = %created.id, "provider thread created");
        Ok(created.id)
    }

    async fn create_message(&self, thread: &str, message: OutgoingMessage) -> Result<String> {
        let body = message_body(&message);
        let created: IdOnly = self
            .post_json(&format!("/threads/{thread}/messages"), &body)
            .await?;
        Ok(created.id)
    }

    async fn start_run(&self, thread: &str, assistant: &str) -> Result<ProviderRun> {
        self.post_json(
            &format!("/threads/{thread}/runs"),
            &json!({ "assistant_id": assistant }),
        )
        .await
    }

    async fn get_run(&self, thread: &str, run: &str) -> Result<ProviderRun> {
        self.get_json(&format!("/threads/{thread}/runs/{run}")).await
    }

    async fn cancel_run(&self, thread: &str, run: &str) -> Result<()> {
        let _: Value = self
            .post_json(&format!("/threads/{thread}/runs/{run}/cancel"), &json!({}))
            .await?;
        Ok(())
    }

    async fn list_messages(&self, thread: &str, limit: u32) -> Result<Vec<ProviderMessage>> {
        let list: MessageList = self
            .get_json(&format!("/threads/{thread}/messages?order=desc&limit={limit}"))
            .await?;
        Ok(list.data)
    }

    async fn upload_file(&self, file: FileUpload) -> Result<String> {
        let size = file.bytes.len();
        let mut part = reqwest::multipart::Part::bytes(file.bytes).file_name(file.filename.clone());
        if let Some(mime) = file.mime_type.as_deref() {
            part = part.mime_str(mime).map_err(from_reqwest)?;
        }
        let form = reqwest::multipart::Form::new()
            .text("purpose", "assistants")
            .part("file", part);

        let resp = self
            .authed(self.client.post(self.url("/files")))
            .multipart(form)
            .send()
            .await
            .map_err(from_reqwest)?;
        let text = read_body(&self.id, resp).await?;
        let uploaded: IdOnly = serde_json::from_str(&text)?;

        tracing::debug!(
            provider = %self.id,
            file = %uploaded.id,
            filename = %file.filename,
            size,
            "file uploaded to provider"
        );
        Ok(uploaded.id)
    }

    async fn create_assistant(&self, spec: AssistantSpec) -> Result<String> {
        let tools: Vec<Value> = spec.tools.iter().map(|t| json!({ "type": t })).collect();
        let mut body = json!({
            "name": spec.name,
            "model": spec.model,
            "tools": tools,
        });
        if let Some(instructions) = spec.instructions {
            body["instructions"] = Value::String(instructions);
        }
        let created: IdOnly = self.post_json("/assistants", &body).await?;
        tracing::info!(provider = %self.id, assistant = %created.id, "provider assistant created");
        Ok(created.id)
    }

    async fn assistant_exists(&self, assistant: &str) -> Result<bool> {
        let resp = self
            .authed(self.client.get(self.url(&format!("/assistants/{assistant}"))))
            .send()
            .await
            .map_err(from_reqwest)?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(false);
        }
        read_body(&self.id, resp).await?;
        Ok(true)
    }
}

#[async_trait::async_trait]
impl TitleSummarizer for OpenAiAssistants {
    async fn summarize_title(&self, text: &str, max_chars: usize) -> Result<String> {
        let body = json!({
            "model": self.summary_model,
            "messages": [
                { "role": "system", "content": title_prompt(max_chars) },
                { "role": "user", "content": text },
            ],
            "max_tokens": 32,
            "temperature": 0.3,
        });
        let resp: Value = self.post_json("/chat/completions", &body).await?;
        resp.pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::Provider {
                provider: self.id.clone(),
                message: "missing message content in completion response".into(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_body_without_files_has_no_attachments() {
        let body = message_body(&OutgoingMessage {
            content: "hi".into(),
            file_ids: vec![],
        });
        assert_eq!(body["role"], "user");
        assert_eq!(body["content"], "hi");
        assert!(body.get("attachments").is_none());
    }

    #[test]
    fn message_body_attaches_files_to_code_interpreter() {
        let body = message_body(&OutgoingMessage {
            content: "see file".into(),
            file_ids: vec!["file_1".into()],
        });
        assert_eq!(body["attachments"][0]["file_id"], "file_1");
        assert_eq!(body["attachments"][0]["tools"][0]["type"], "code_interpreter");
    }

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let cfg = ProviderConfig {
            base_url: "http://localhost:9999/v1/".into(),
            ..Default::default()
        };
        let p = OpenAiAssistants::with_key(&cfg, "k".into()).unwrap();
        assert_eq!(p.url("/threads"), "http://localhost:9999/v1/threads");
    }
}
