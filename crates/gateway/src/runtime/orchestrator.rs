//! Run Orchestrator: drives one provider run from submission to the last
//! streamed chunk.
//!
//! ```text
//! Submitting ─▶ Polling ─▶ Streaming ─▶ Done
//!                  │            │
//!                  ├─▶ Failed   └─▶ Cancelled
//!                  └─▶ TimedOut
//! ```
//!
//! Polling and chunk emission both wait on the run's [`CancelToken`], so a
//! client disconnect stops the loop at the next suspension point.

use std::cmp::Reverse;
use std::fmt;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use wc_domain::config::ChatConfig;
use wc_domain::error::{Error, Result};
use wc_providers::{AssistantsApi, OutgoingMessage, ProviderMessage, RunStatus};

use super::cancel::CancelToken;
use super::ChatEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Submitting,
    Polling,
    Streaming,
    Done,
    Failed,
    TimedOut,
    Cancelled,
}

impl RunPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Submitting => "submitting",
            Self::Polling => "polling",
            Self::Streaming => "streaming",
            Self::Done => "done",
            Self::Failed => "failed",
            Self::TimedOut => "timed_out",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Timing knobs for one run, taken from `[chat]`.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub poll_interval: Duration,
    pub max_polls: u32,
    pub chunk_delay: Duration,
    pub list_limit: u32,
}

impl RunSettings {
    pub fn from_config(chat: &ChatConfig) -> Self {
        Self {
            poll_interval: chat.poll_interval(),
            max_polls: chat.max_polls,
            chunk_delay: chat.chunk_delay(),
            list_limit: chat.list_messages_limit,
        }
    }
}

/// What to submit: the composed message and the handles it runs against.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub thread_handle: String,
    pub assistant_handle: String,
    pub message: String,
    pub file_ids: Vec<String>,
}

/// The completed run's assistant output.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub run_id: String,
    pub message_id: String,
    pub text: String,
    pub polls: u32,
}

pub struct Orchestrator<'a> {
    provider: &'a dyn AssistantsApi,
    settings: &'a RunSettings,
    cancel: &'a CancelToken,
    phase: RunPhase,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        provider: &'a dyn AssistantsApi,
        settings: &'a RunSettings,
        cancel: &'a CancelToken,
    ) -> Self {
        Self {
            provider,
            settings,
            cancel,
            phase: RunPhase::Submitting,
        }
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    fn enter(&mut self, phase: RunPhase) {
        tracing::debug!(from = %self.phase, to = %phase, "run phase");
        self.phase = phase;
    }

    fn fail(&mut self, err: Error) -> Error {
        let phase = match &err {
            Error::ProviderTimeout { .. } => RunPhase::TimedOut,
            Error::Cancelled => RunPhase::Cancelled,
            _ => RunPhase::Failed,
        };
        self.enter(phase);
        err
    }

    /// Submit, poll until the run settles and fetch its output.
    ///
    /// On success the orchestrator is in [`RunPhase::Streaming`].
    pub async fn execute(&mut self, req: &RunRequest) -> Result<RunOutput> {
        match self.execute_inner(req).await {
            Ok(output) => {
                self.enter(RunPhase::Streaming);
                Ok(output)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    async fn execute_inner(&mut self, req: &RunRequest) -> Result<RunOutput> {
        let started = Instant::now();
        self.provider
            .create_message(
                &req.thread_handle,
                OutgoingMessage {
                    content: req.message.clone(),
                    file_ids: req.file_ids.clone(),
                },
            )
            .await?;
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let run = self
            .provider
            .start_run(&req.thread_handle, &req.assistant_handle)
            .await?;
        tracing::info!(
            run_id = %run.id,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "run submitted"
        );

        self.enter(RunPhase::Polling);
        let polls = self.poll(&req.thread_handle, &run.id).await?;

        let messages = self
            .provider
            .list_messages(&req.thread_handle, self.settings.list_limit)
            .await?;
        let message = select_output(&messages, &run.id).ok_or_else(|| {
            Error::NoAssistantOutput(format!("run {} listed no assistant message", run.id))
        })?;
        let text = message
            .first_text()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                Error::NoAssistantOutput(format!("message {} has no text content", message.id))
            })?
            .to_string();

        Ok(RunOutput {
            run_id: run.id,
            message_id: message.id.clone(),
            text,
            polls,
        })
    }

    /// Query run status every `poll_interval`, at most `max_polls` times.
    /// Returns the number of queries made.
    async fn poll(&self, thread: &str, run_id: &str) -> Result<u32> {
        for attempt in 1..=self.settings.max_polls {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    self.cancel_remote(thread, run_id).await;
                    return Err(Error::Cancelled);
                }
                _ = tokio::time::sleep(self.settings.poll_interval) => {}
            }

            let run = self.provider.get_run(thread, run_id).await?;
            tracing::debug!(run_id, attempt, status = run.status.as_str(), "run status");
            match run.status {
                RunStatus::Completed => {
                    tracing::info!(run_id, polls = attempt, "run completed");
                    return Ok(attempt);
                }
                status if status.is_pending() => continue,
                status => {
                    let message = run
                        .last_error
                        .map(|e| match e.code {
                            Some(code) => format!("{code}: {}", e.message),
                            None => e.message,
                        })
                        .unwrap_or_else(|| "no error detail".into());
                    return Err(Error::RunFailed {
                        status: status.as_str().into(),
                        message,
                    });
                }
            }
        }
        tracing::warn!(run_id, polls = self.settings.max_polls, "run timed out");
        Err(Error::ProviderTimeout {
            polls: self.settings.max_polls,
        })
    }

    async fn cancel_remote(&self, thread: &str, run_id: &str) {
        match self.provider.cancel_run(thread, run_id).await {
            Ok(()) => tracing::info!(run_id, "run cancelled"),
            Err(e) => tracing::warn!(run_id, error = %e, "failed to cancel provider run"),
        }
    }

    /// Emit `text` as word chunks. The first chunk goes out immediately.
    pub async fn stream(&mut self, text: &str, tx: &mpsc::Sender<ChatEvent>) -> Result<usize> {
        let started = Instant::now();
        let mut sent = 0;
        for chunk in chunk_words(text) {
            if sent > 0 && !self.settings.chunk_delay.is_zero() {
                let cancel = self.cancel;
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {}
                    _ = tokio::time::sleep(self.settings.chunk_delay) => {}
                }
            }
            if self.cancel.is_cancelled() {
                return Err(self.fail(Error::Cancelled));
            }
            let event = ChatEvent::Delta {
                text: chunk.to_string(),
            };
            if tx.send(event).await.is_err() {
                return Err(self.fail(Error::Cancelled));
            }
            sent += 1;
        }
        tracing::debug!(
            chunks = sent,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "output streamed"
        );
        self.enter(RunPhase::Done);
        Ok(sent)
    }
}

/// Pick the run's output among provider messages listed newest first.
///
/// The newest assistant message tagged with `run_id` wins; otherwise the
/// newest assistant message overall.
pub fn select_output<'m>(
    messages: &'m [ProviderMessage],
    run_id: &str,
) -> Option<&'m ProviderMessage> {
    let newest = |run_only: bool| {
        messages
            .iter()
            .filter(|m| m.is_assistant())
            .filter(|m| !run_only || m.run_id.as_deref() == Some(run_id))
            .min_by_key(|m| Reverse(m.created_at))
    };
    newest(true).or_else(|| newest(false))
}

/// Split text into words, each carrying its trailing whitespace.
///
/// Concatenating the chunks reproduces `text` exactly.
pub fn chunk_words(text: &str) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut after_space = false;
    for (i, c) in text.char_indices() {
        if c.is_whitespace() {
            after_space = true;
        } else if after_space {
            chunks.push(&text[start..i]);
            start = i;
            after_space = false;
        }
    }
    if start < text.len() {
        chunks.push(&text[start..]);
    }
    chunks
}
