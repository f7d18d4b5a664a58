//! In-process provider with scripted behaviour, for tests and local demos.
//!
//! Every call is counted so callers can assert how many remote requests a
//! flow made. Run statuses are consumed from a queue; once it is empty the
//! last status repeats.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;

use crate::traits::{
    AssistantSpec, AssistantsApi, ContentPart, FileUpload, OutgoingMessage, ProviderMessage,
    ProviderRun, RunError, RunStatus, TextValue, TitleSummarizer,
};
use wc_domain::error::{Error, Result};

#[derive(Debug, Default)]
pub struct CallCounts {
    pub create_thread: AtomicU32,
    pub create_message: AtomicU32,
    pub start_run: AtomicU32,
    pub get_run: AtomicU32,
    pub cancel_run: AtomicU32,
    pub list_messages: AtomicU32,
    pub upload_file: AtomicU32,
    pub create_assistant: AtomicU32,
    pub assistant_exists: AtomicU32,
    pub summarize: AtomicU32,
}

impl CallCounts {
    /// Calls to the conversation API, excluding title summaries.
    pub fn total(&self) -> u32 {
        [
            &self.create_thread,
            &self.create_message,
            &self.start_run,
            &self.get_run,
            &self.cancel_run,
            &self.list_messages,
            &self.upload_file,
            &self.create_assistant,
            &self.assistant_exists,
        ]
        .iter()
        .map(|c| c.load(Ordering::SeqCst))
        .sum()
    }
}

/// A scripted [`AssistantsApi`] + [`TitleSummarizer`].
pub struct ScriptedProvider {
    pub calls: CallCounts,
    statuses: Mutex<VecDeque<RunStatus>>,
    last_status: Mutex<RunStatus>,
    reply: Mutex<Option<String>>,
    title: Mutex<Option<String>>,
    fail_create_thread: Mutex<bool>,
    fail_upload: Mutex<bool>,
    known_assistants: Mutex<HashSet<String>>,
    sent: Mutex<Vec<(String, OutgoingMessage)>>,
    uploads: Mutex<Vec<FileUpload>>,
    next_id: AtomicU32,
}

impl Default for ScriptedProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedProvider {
    /// Completes on the first poll and replies "Hello from the assistant.".
    pub fn new() -> Self {
        Self {
            calls: CallCounts::default(),
            statuses: Mutex::new(VecDeque::new()),
            last_status: Mutex::new(RunStatus::Completed),
            reply: Mutex::new(Some("Hello from the assistant.".into())),
            title: Mutex::new(None),
            fail_create_thread: Mutex::new(false),
            fail_upload: Mutex::new(false),
            known_assistants: Mutex::new(HashSet::new()),
            sent: Mutex::new(Vec::new()),
            uploads: Mutex::new(Vec::new()),
            next_id: AtomicU32::new(1),
        }
    }

    /// Statuses returned by successive `get_run` calls.
    pub fn with_statuses(self, statuses: impl IntoIterator<Item = RunStatus>) -> Self {
        let queue: VecDeque<RunStatus> = statuses.into_iter().collect();
        if let Some(last) = queue.back() {
            *self.last_status.lock() = *last;
        }
        *self.statuses.lock() = queue;
        self
    }

    /// Assistant text returned after completion; `None` lists no assistant message.
    pub fn with_reply(self, reply: Option<&str>) -> Self {
        *self.reply.lock() = reply.map(str::to_string);
        self
    }

    /// Summarized title; `None` makes summarization fail.
    pub fn with_title(self, title: Option<&str>) -> Self {
        *self.title.lock() = title.map(str::to_string);
        self
    }

    pub fn failing_thread_creation(self) -> Self {
        *self.fail_create_thread.lock() = true;
        self
    }

    pub fn failing_uploads(self) -> Self {
        *self.fail_upload.lock() = true;
        self
    }

    /// Messages sent with `create_message`, as `(thread, message)`.
    pub fn sent_messages(&self) -> Vec<(String, OutgoingMessage)> {
        self.sent.lock().clone()
    }

    pub fn uploaded_files(&self) -> Vec<FileUpload> {
        self.uploads.lock().clone()
    }

    fn next(&self, prefix: &str) -> String {
        format!("{prefix}_{}", self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    fn fail(what: &str) -> Error {
        Error::Provider {
            provider: "scripted".into(),
            message: format!("{what} failed"),
        }
    }
}

#[async_trait::async_trait]
impl AssistantsApi for ScriptedProvider {
    async fn create_thread(&self) -> Result<String> {
        self.calls.create_thread.fetch_add(1, Ordering::SeqCst);
        if *self.fail_create_thread.lock() {
            return Err(Self::fail("create_thread"));
        }
        Ok(self.next("thread"))
    }

    async fn create_message(&self, thread: &str, message: OutgoingMessage) -> Result<String> {
        self.calls.create_message.fetch_add(1, Ordering::SeqCst);
        self.sent.lock().push((thread.to_string(), message));
        Ok(self.next("msg"))
    }

    async fn start_run(&self, _thread: &str, _assistant: &str) -> Result<ProviderRun> {
        self.calls.start_run.fetch_add(1, Ordering::SeqCst);
        Ok(ProviderRun {
            id: self.next("run"),
            status: RunStatus::Queued,
            last_error: None,
        })
    }

    async fn get_run(&self, _thread: &str, run: &str) -> Result<ProviderRun> {
        self.calls.get_run.fetch_add(1, Ordering::SeqCst);
        let status = self
            .statuses
            .lock()
            .pop_front()
            .unwrap_or(*self.last_status.lock());
        let last_error = (status == RunStatus::Failed).then(|| RunError {
            code: Some("server_error".into()),
            message: "scripted failure".into(),
        });
        Ok(ProviderRun {
            id: run.to_string(),
            status,
            last_error,
        })
    }

    async fn cancel_run(&self, _thread: &str, _run: &str) -> Result<()> {
        self.calls.cancel_run.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn list_messages(&self, _thread: &str, _limit: u32) -> Result<Vec<ProviderMessage>> {
        self.calls.list_messages.fetch_add(1, Ordering::SeqCst);
        let mut out = Vec::new();
        if let Some(reply) = self.reply.lock().clone() {
            out.push(ProviderMessage {
                id: self.next("msg"),
                role: "assistant".into(),
                created_at: 2,
                run_id: None,
                content: vec![ContentPart::Text {
                    text: TextValue { value: reply },
                }],
            });
        }
        if let Some((_, last)) = self.sent.lock().last() {
            out.push(ProviderMessage {
                id: self.next("msg"),
                role: "user".into(),
                created_at: 1,
                run_id: None,
                content: vec![ContentPart::Text {
                    text: TextValue {
                        value: last.content.clone(),
                    },
                }],
            });
        }
        Ok(out)
    }

    async fn upload_file(&self, file: FileUpload) -> Result<String> {
        self.calls.upload_file.fetch_add(1, Ordering::SeqCst);
        if *self.fail_upload.lock() {
            return Err(Self::fail("upload_file"));
        }
        self.uploads.lock().push(file);
        Ok(self.next("file"))
    }

    async fn create_assistant(&self, _spec: AssistantSpec) -> Result<String> {
        self.calls.create_assistant.fetch_add(1, Ordering::SeqCst);
        let id = self.next("asst");
        self.known_assistants.lock().insert(id.clone());
        Ok(id)
    }

    async fn assistant_exists(&self, assistant: &str) -> Result<bool> {
        self.calls.assistant_exists.fetch_add(1, Ordering::SeqCst);
        Ok(self.known_assistants.lock().contains(assistant))
    }
}

#[async_trait::async_trait]
impl TitleSummarizer for ScriptedProvider {
    async fn summarize_title(&self, _text: &str, _max_chars: usize) -> Result<String> {
        self.calls.summarize.fetch_add(1, Ordering::SeqCst);
        self.title
            .lock()
            .clone()
            .ok_or_else(|| Self::fail("summarize_title"))
    }
}
