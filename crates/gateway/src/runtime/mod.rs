//! Chat runtime: the path from one submitted widget message to a stream of
//! [`ChatEvent`]s.
//!
//! Entry point: [`start_chat`] settles every precondition synchronously
//! (ownership, thread, assistant, attachment upload, user turn) and then
//! spawns the provider run, returning the receiving end of its event
//! channel. Errors returned by `start_chat` happen before any byte is
//! streamed; errors inside the spawned run only reach the transport as a
//! [`ChatEvent::Error`].

pub mod access;
pub mod assistants;
pub mod attachments;
pub mod cancel;
pub mod orchestrator;
pub mod persist;
pub mod threads;
pub mod title;

use std::time::Instant;

use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::Instrument;

use wc_domain::error::{Error, Result};
use wc_domain::model::Principal;

use crate::state::AppState;
use cancel::CancelToken;
use orchestrator::{Orchestrator, RunRequest, RunSettings};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ChatEvent: what the transport receives
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    /// One word chunk of the assistant's answer.
    Delta { text: String },

    /// The answer is complete and persisted (`message_id` is `None` when
    /// persistence failed).
    Done {
        thread_id: String,
        message_id: Option<String>,
    },

    /// The run failed after the response started.
    Error { message: String },
}

impl ChatEvent {
    /// SSE event name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Delta { .. } => "delta",
            Self::Done { .. } => "done",
            Self::Error { .. } => "error",
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request / session
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One widget message.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub principal: Principal,
    pub assistant_id: String,
    pub message: String,
    pub thread_id: Option<String>,
    /// Id of a previously stored attachment.
    pub attachment_id: Option<String>,
    /// Submit to the provider without persisting a user turn.
    pub hidden: bool,
    pub context: Option<Value>,
}

/// A started run: the settled thread and the event stream of its answer.
pub struct ChatSession {
    pub thread_id: String,
    pub created: bool,
    pub events: mpsc::Receiver<ChatEvent>,
    /// Cancelled when the client goes away.
    pub cancel: CancelToken,
}

/// Build the text sent to the provider.
pub fn compose_message(
    prefix: Option<&str>,
    message: &str,
    context_label: &str,
    context: Option<&Value>,
) -> String {
    let mut out = String::new();
    if let Some(prefix) = prefix.map(str::trim).filter(|p| !p.is_empty()) {
        out.push_str(prefix);
        out.push_str("\n\n");
    }
    out.push_str(message);

    let context = context.filter(|c| match c {
        Value::Null => false,
        Value::Object(map) => !map.is_empty(),
        _ => true,
    });
    if let Some(context) = context {
        let pretty = serde_json::to_string_pretty(context).unwrap_or_else(|_| context.to_string());
        out.push_str("\n\n");
        out.push_str(context_label);
        out.push_str(": ");
        out.push_str(&pretty);
    }
    out
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// start_chat
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Settle the request and spawn the provider run.
///
/// Ownership of the attachment, assistant and thread is checked before the
/// first provider call.
pub async fn start_chat(state: &AppState, req: ChatRequest) -> Result<ChatSession> {
    let started = Instant::now();
    let message = req.message.trim();
    if message.is_empty() {
        return Err(Error::InvalidArgument("message is required".into()));
    }
    if req.assistant_id.trim().is_empty() {
        return Err(Error::InvalidArgument("assistantId is required".into()));
    }

    let store = state.store.as_ref();
    let provider = state.provider.as_ref();
    let chat = &state.config.chat;
    let principal = &req.principal;

    let attachment = match req.attachment_id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => Some(access::attachment(store, principal, id).await?),
        _ => None,
    };
    let profile = access::assistant(store, principal, &req.assistant_id).await?;

    let resolved = threads::resolve(
        store,
        provider,
        chat,
        principal,
        &profile.id,
        req.thread_id.as_deref(),
    )
    .await?;
    let thread_id = resolved.thread.id.clone();

    let assistant_handle =
        assistants::provider_assistant(store, provider, &state.config.provider, &profile).await?;

    let resolved_attachment = match attachment {
        Some(attachment) => {
            Some(attachments::resolve(state.blobs.as_ref(), provider, attachment).await?)
        }
        None => None,
    };
    let file_ids: Vec<String> = resolved_attachment
        .iter()
        .map(|r| r.file_id.clone())
        .collect();

    if req.hidden {
        tracing::debug!(thread_id = %thread_id, "hidden message, user turn not persisted");
    } else {
        let metadata = resolved_attachment.as_ref().map(|r| {
            json!({ "attachment_id": r.attachment.id, "filename": r.attachment.filename })
        });
        persist::append_user(store, &thread_id, principal, message, metadata).await?;
    }

    let prefix = profile
        .user_prompt
        .as_deref()
        .filter(|p| !p.trim().is_empty())
        .or(chat.system_prompt.as_deref());
    let request = RunRequest {
        thread_handle: resolved.handle,
        assistant_handle,
        message: compose_message(prefix, message, &chat.context_label, req.context.as_ref()),
        file_ids,
    };
    tracing::info!(
        thread_id = %thread_id,
        created = resolved.created,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "chat run setup complete"
    );

    let cancel = state.cancel_map.register(&thread_id);
    let (tx, rx) = mpsc::channel::<ChatEvent>(64);
    let job = RunJob {
        thread_id: thread_id.clone(),
        assistant_id: profile.id.clone(),
        created: resolved.created,
        request,
        started,
    };
    let span = tracing::info_span!(
        "chat_run",
        thread_id = %thread_id,
        assistant = %profile.id,
        created = resolved.created,
    );
    tokio::spawn(drive(state.clone(), job, cancel.clone(), tx).instrument(span));

    Ok(ChatSession {
        thread_id,
        created: resolved.created,
        events: rx,
        cancel,
    })
}

struct RunJob {
    thread_id: String,
    assistant_id: String,
    created: bool,
    request: RunRequest,
    started: Instant,
}

async fn drive(state: AppState, job: RunJob, cancel: CancelToken, tx: mpsc::Sender<ChatEvent>) {
    let settings = RunSettings::from_config(&state.config.chat);
    let mut orch = Orchestrator::new(state.provider.as_ref(), &settings, &cancel);

    let result = async {
        let output = orch.execute(&job.request).await?;
        orch.stream(&output.text, &tx).await?;
        Ok::<_, Error>(output)
    }
    .await;

    let output = match result {
        Ok(output) => output,
        Err(Error::Cancelled) => {
            tracing::info!(phase = %orch.phase(), "chat run cancelled");
            state.cancel_map.remove(&job.thread_id, &cancel);
            return;
        }
        Err(e) => {
            match &e {
                Error::ProviderTimeout { .. }
                | Error::RunFailed { .. }
                | Error::NoAssistantOutput(_) => {
                    tracing::warn!(phase = %orch.phase(), error = %e, "chat run failed")
                }
                _ => tracing::error!(phase = %orch.phase(), error = %e, "chat run failed"),
            }
            let _ = tx
                .send(ChatEvent::Error {
                    message: e.public_message(),
                })
                .await;
            state.cancel_map.remove(&job.thread_id, &cancel);
            return;
        }
    };

    let metadata = json!({
        "provider_message_id": output.message_id,
        "provider_run_id": output.run_id,
    });
    let message_id = match persist::append_assistant(
        state.store.as_ref(),
        &job.thread_id,
        Some(&job.assistant_id),
        &output.text,
        Some(metadata),
    )
    .await
    {
        Ok(turn) => Some(turn.id),
        Err(e) => {
            tracing::error!(error = %e, "failed to persist assistant turn");
            None
        }
    };
    let _ = tx
        .send(ChatEvent::Done {
            thread_id: job.thread_id.clone(),
            message_id,
        })
        .await;
    drop(tx);
    state.cancel_map.remove(&job.thread_id, &cancel);
    tracing::info!(
        polls = output.polls,
        total_ms = job.started.elapsed().as_millis() as u64,
        "chat run finished"
    );

    let thread_id = job.thread_id;
    let created = job.created;
    tokio::spawn(
        async move {
            if let Err(e) = title::maybe_retitle(
                state.store.as_ref(),
                state.summarizer.as_ref(),
                &state.config.chat,
                &thread_id,
                created,
                &output.text,
            )
            .await
            {
                tracing::warn!(error = %e, "title update failed");
            }
        }
        .in_current_span(),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compose_plain_message() {
        assert_eq!(compose_message(None, "Hi", "Data for context", None), "Hi");
    }

    #[test]
    fn compose_with_prefix_and_context() {
        let ctx = json!({"page": "pricing"});
        let composed = compose_message(Some("Be brief."), "Hi", "Data for context", Some(&ctx));
        assert_eq!(
            composed,
            "Be brief.\n\nHi\n\nData for context: {\n  \"page\": \"pricing\"\n}"
        );
    }

    #[test]
    fn empty_context_is_omitted() {
        let empty = json!({});
        assert_eq!(compose_message(Some("  "), "Hi", "Ctx", Some(&empty)), "Hi");
        assert_eq!(compose_message(None, "Hi", "Ctx", Some(&Value::Null)), "Hi");
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let delta = serde_json::to_value(ChatEvent::Delta { text: "Hi ".into() }).unwrap();
        assert_eq!(delta, json!({"type": "delta", "text": "Hi "}));
        assert_eq!(ChatEvent::Error { message: "x".into() }.name(), "error");
    }
}
