#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, Response, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use wc_domain::config::{AssistantConfig, Config};
use wc_domain::error::{Error, Result};
use wc_domain::model::{
    AssistantProfile, Attachment, NewAttachment, NewThread, NewTurn, Role, Thread, ThreadUpdate,
    Turn,
};
use wc_gateway::api;
use wc_gateway::bootstrap::seed_assistants;
use wc_gateway::state::AppState;
use wc_providers::ScriptedProvider;
use wc_store::{BlobStore, ChatStore, LocalBlobStore, SqliteChatStore};

pub const ASSISTANT: &str = "support";

pub struct Harness {
    pub state: AppState,
    pub provider: Arc<ScriptedProvider>,
    pub store: Arc<SqliteChatStore>,
    pub blobs: Arc<LocalBlobStore>,
    /// Switches for injected store failures; all off by default.
    pub faults: Arc<StoreFaults>,
    _dir: tempfile::TempDir,
}

pub async fn harness(provider: ScriptedProvider) -> Harness {
    harness_with(provider, |_| {}).await
}

/// Fast polling, no typing delay, one seeded assistant.
pub async fn harness_with(provider: ScriptedProvider, tweak: impl FnOnce(&mut Config)) -> Harness {
    let mut config = Config::default();
    config.chat.poll_interval_ms = 1;
    config.chat.chunk_delay_ms = 0;
    config.chat.max_polls = 5;
    config.assistants.insert(
        ASSISTANT.into(),
        AssistantConfig {
            name: "Support".into(),
            instructions: Some("Answer briefly.".into()),
            welcome_messages: vec!["Hi! How can I help?".into()],
            ..Default::default()
        },
    );
    tweak(&mut config);

    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SqliteChatStore::in_memory().unwrap());
    seed_assistants(store.as_ref(), &config).await.unwrap();
    let blobs = Arc::new(LocalBlobStore::new(dir.path()));
    let provider = Arc::new(provider);
    let faults = Arc::new(StoreFaults::default());
    let faulty = Arc::new(FaultyStore {
        inner: store.clone(),
        faults: faults.clone(),
    });

    let state = AppState::new(
        Arc::new(config),
        faulty,
        blobs.clone(),
        provider.clone(),
        provider.clone(),
    );
    Harness {
        state,
        provider,
        store,
        blobs,
        faults,
        _dir: dir,
    }
}

impl Harness {
    pub fn app(&self) -> Router {
        api::router(self.state.clone()).with_state(self.state.clone())
    }

    pub async fn send(&self, req: Request<Body>) -> Response<Body> {
        self.app().oneshot(req).await.unwrap()
    }

    pub async fn attachment(&self, owner: &str, name: &str, bytes: &[u8]) -> Attachment {
        let path = format!("{owner}/{name}");
        self.blobs.put(&path, bytes).await.unwrap();
        self.store
            .create_attachment(NewAttachment {
                user_id: owner.into(),
                filename: name.into(),
                storage_path: path,
                mime_type: Some("text/csv".into()),
                size_bytes: Some(bytes.len() as i64),
            })
            .await
            .unwrap()
    }

    /// Wait for a detached task to update the thread's title.
    pub async fn wait_for_title(&self, thread_id: &str, placeholder: &str) -> Thread {
        for _ in 0..200 {
            let thread = self.store.get_thread(thread_id).await.unwrap().unwrap();
            if thread.title.as_deref() != Some(placeholder) {
                return thread;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        self.store.get_thread(thread_id).await.unwrap().unwrap()
    }
}

pub fn request(method: Method, uri: &str, user: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header("x-widget-user", user);
    }
    match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub fn post(uri: &str, user: &str, body: Value) -> Request<Body> {
    request(Method::POST, uri, Some(user), Some(body))
}

pub fn get(uri: &str, user: &str) -> Request<Body> {
    request(Method::GET, uri, Some(user), None)
}

pub async fn body_text(resp: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(resp: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn expect_json(resp: Response<Body>, status: StatusCode) -> Value {
    assert_eq!(resp.status(), status);
    body_json(resp).await
}

pub fn header<'a>(resp: &'a Response<Body>, name: &str) -> &'a str {
    resp.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}

/// Poll `check` for up to a second.
pub async fn eventually(check: impl Fn() -> bool) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    check()
}

#[derive(Default)]
pub struct StoreFaults {
    pub create_thread: AtomicBool,
    pub update_thread: AtomicBool,
    pub assistant_turns: AtomicBool,
}

impl StoreFaults {
    pub fn fail_create_thread(&self) {
        self.create_thread.store(true, Ordering::SeqCst);
    }

    pub fn fail_update_thread(&self) {
        self.update_thread.store(true, Ordering::SeqCst);
    }

    pub fn fail_assistant_turns(&self) {
        self.assistant_turns.store(true, Ordering::SeqCst);
    }
}

fn injected(what: &str) -> Error {
    Error::Storage(format!("injected {what} failure at /var/lib/widgetchat/db"))
}

/// SQLite store whose writes can be made to fail on demand.
pub struct FaultyStore {
    inner: Arc<SqliteChatStore>,
    faults: Arc<StoreFaults>,
}

#[axum::async_trait]
impl ChatStore for FaultyStore {
    async fn create_thread(&self, new: NewThread) -> Result<Thread> {
        if self.faults.create_thread.load(Ordering::SeqCst) {
            return Err(injected("create_thread"));
        }
        self.inner.create_thread(new).await
    }

    async fn get_thread(&self, id: &str) -> Result<Option<Thread>> {
        self.inner.get_thread(id).await
    }

    async fn list_threads(&self, user_id: &str, assistant_id: Option<&str>) -> Result<Vec<Thread>> {
        self.inner.list_threads(user_id, assistant_id).await
    }

    async fn update_thread(&self, id: &str, update: ThreadUpdate) -> Result<Thread> {
        if self.faults.update_thread.load(Ordering::SeqCst) {
            return Err(injected("update_thread"));
        }
        self.inner.update_thread(id, update).await
    }

    async fn append_turn(&self, new: NewTurn) -> Result<Turn> {
        if new.role == Role::Assistant && self.faults.assistant_turns.load(Ordering::SeqCst) {
            return Err(injected("append_turn"));
        }
        self.inner.append_turn(new).await
    }

    async fn list_turns(&self, thread_id: &str) -> Result<Vec<Turn>> {
        self.inner.list_turns(thread_id).await
    }

    async fn create_attachment(&self, new: NewAttachment) -> Result<Attachment> {
        self.inner.create_attachment(new).await
    }

    async fn get_attachment(&self, id: &str) -> Result<Option<Attachment>> {
        self.inner.get_attachment(id).await
    }

    async fn upsert_assistant(&self, profile: AssistantProfile) -> Result<()> {
        self.inner.upsert_assistant(profile).await
    }

    async fn get_assistant(&self, id: &str) -> Result<Option<AssistantProfile>> {
        self.inner.get_assistant(id).await
    }

    async fn set_assistant_provider_id(&self, id: &str, provider_id: &str) -> Result<()> {
        self.inner.set_assistant_provider_id(id, provider_id).await
    }
}
