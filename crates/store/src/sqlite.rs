//! SQLite-backed [`ChatStore`].
//!
//! One connection behind a mutex; every call runs on the blocking pool.
//! Timestamps are stored as fixed-width RFC 3339 strings (nanosecond
//! precision, `Z` suffix) so lexical order equals chronological order, with
//! `rowid` breaking ties between turns created in the same instant.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde_json::Value;

use crate::store::ChatStore;
use wc_domain::error::{Error, Result};
use wc_domain::model::{
    AssistantProfile, Attachment, NewAttachment, NewThread, NewTurn, ResourceKind, Role, Thread,
    ThreadUpdate, Turn,
};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS threads (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    assistant_id TEXT,
    title TEXT,
    metadata TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_threads_owner
    ON threads(user_id, assistant_id, updated_at);

CREATE TABLE IF NOT EXISTS turns (
    id TEXT PRIMARY KEY,
    thread_id TEXT NOT NULL REFERENCES threads(id) ON DELETE CASCADE,
    role TEXT NOT NULL,
    content TEXT NOT NULL,
    user_id TEXT,
    assistant_id TEXT,
    metadata TEXT,
    completed INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_turns_thread
    ON turns(thread_id, created_at);

CREATE TABLE IF NOT EXISTS attachments (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    filename TEXT NOT NULL,
    storage_path TEXT NOT NULL,
    mime_type TEXT,
    size_bytes INTEGER,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS assistants (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT,
    instructions TEXT,
    user_prompt TEXT,
    model TEXT,
    welcome_messages TEXT NOT NULL DEFAULT '[]',
    provider_assistant_id TEXT
);
";

const THREAD_COLUMNS: &str =
    "id, user_id, assistant_id, title, metadata, created_at, updated_at";
const TURN_COLUMNS: &str =
    "id, thread_id, role, content, user_id, assistant_id, metadata, completed, created_at";
const ATTACHMENT_COLUMNS: &str =
    "id, user_id, filename, storage_path, mime_type, size_bytes, created_at";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Store
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct SqliteChatStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteChatStore {
    pub fn open(db_path: &Path) -> Result<Self> {
        tracing::info!(path = %db_path.display(), "opening chat store");
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(db_path)
            .map_err(|e| Error::Storage(format!("failed to open database: {e}")))?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .map_err(|e| Error::Storage(format!("failed to set pragmas: {e}")))?;
        Self::with_connection(conn)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Storage(format!("failed to open in-memory database: {e}")))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(|e| Error::Storage(format!("failed to set pragmas: {e}")))?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| Error::Storage(format!("migration failed: {e}")))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn call<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> rusqlite::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock();
            f(&mut guard)
        })
        .await
        .map_err(|e| Error::Storage(format!("store task failed: {e}")))?
        .map_err(|e| Error::Storage(e.to_string()))
    }
}

// ── row helpers ─────────────────────────────────────────────────────

fn fmt_ts(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn conversion_err<E>(idx: usize, e: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

fn ts_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_err(idx, e))
}

fn json_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Value>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| serde_json::from_str(&s).map_err(|e| conversion_err(idx, e)))
        .transpose()
}

fn thread_from_row(row: &Row<'_>) -> rusqlite::Result<Thread> {
    Ok(Thread {
        id: row.get(0)?,
        user_id: row.get(1)?,
        assistant_id: row.get(2)?,
        title: row.get(3)?,
        metadata: json_at(row, 4)?.unwrap_or_else(|| Value::Object(Default::default())),
        created_at: ts_at(row, 5)?,
        updated_at: ts_at(row, 6)?,
    })
}

fn turn_from_row(row: &Row<'_>) -> rusqlite::Result<Turn> {
    let role_raw: String = row.get(2)?;
    let role = Role::parse(&role_raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            Type::Text,
            format!("unknown role '{role_raw}'").into(),
        )
    })?;
    Ok(Turn {
        id: row.get(0)?,
        thread_id: row.get(1)?,
        role,
        content: row.get(3)?,
        user_id: row.get(4)?,
        assistant_id: row.get(5)?,
        metadata: json_at(row, 6)?,
        completed: row.get(7)?,
        created_at: ts_at(row, 8)?,
    })
}

fn attachment_from_row(row: &Row<'_>) -> rusqlite::Result<Attachment> {
    Ok(Attachment {
        id: row.get(0)?,
        user_id: row.get(1)?,
        filename: row.get(2)?,
        storage_path: row.get(3)?,
        mime_type: row.get(4)?,
        size_bytes: row.get(5)?,
        created_at: ts_at(row, 6)?,
    })
}

fn assistant_from_row(row: &Row<'_>) -> rusqlite::Result<AssistantProfile> {
    let welcome: Option<Value> = json_at(row, 6)?;
    let welcome_messages = welcome
        .map(|v| serde_json::from_value(v).map_err(|e| conversion_err(6, e)))
        .transpose()?
        .unwrap_or_default();
    Ok(AssistantProfile {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        instructions: row.get(3)?,
        user_prompt: row.get(4)?,
        model: row.get(5)?,
        welcome_messages,
        provider_assistant_id: row.get(7)?,
    })
}

fn load_thread(conn: &Connection, id: &str) -> rusqlite::Result<Option<Thread>> {
    conn.query_row(
        &format!("SELECT {THREAD_COLUMNS} FROM threads WHERE id = ?1"),
        params![id],
        thread_from_row,
    )
    .optional()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ChatStore impl
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
impl ChatStore for SqliteChatStore {
    async fn create_thread(&self, new: NewThread) -> Result<Thread> {
        let now = Utc::now();
        let metadata = match new.metadata {
            Value::Null => Value::Object(Default::default()),
            other => other,
        };
        let thread = Thread {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: new.user_id,
            assistant_id: new.assistant_id,
            title: new.title,
            metadata,
            created_at: now,
            updated_at: now,
        };
        let row = thread.clone();
        self.call(move |conn| {
            conn.execute(
                "INSERT INTO threads (id, user_id, assistant_id, title, metadata, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                params![
                    row.id,
                    row.user_id,
                    row.assistant_id,
                    row.title,
                    row.metadata.to_string(),
                    fmt_ts(&row.created_at),
                ],
            )
        })
        .await?;
        Ok(thread)
    }

    async fn get_thread(&self, id: &str) -> Result<Option<Thread>> {
        let id = id.to_string();
        self.call(move |conn| load_thread(conn, &id)).await
    }

    async fn list_threads(&self, user_id: &str, assistant_id: Option<&str>) -> Result<Vec<Thread>> {
        let user_id = user_id.to_string();
        let assistant_id = assistant_id.map(str::to_string);
        self.call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {THREAD_COLUMNS} FROM threads
                 WHERE user_id = ?1 AND (?2 IS NULL OR assistant_id = ?2)
                 ORDER BY updated_at DESC, rowid DESC"
            ))?;
            let threads = stmt
                .query_map(params![user_id, assistant_id], thread_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(threads)
        })
        .await
    }

    async fn update_thread(&self, id: &str, update: ThreadUpdate) -> Result<Thread> {
        let key = id.to_string();
        let updated = self
            .call(move |conn| {
                let tx = conn.transaction()?;
                let Some(mut thread) = load_thread(&tx, &key)? else {
                    return Ok(None);
                };
                if let Some(title) = update.title {
                    thread.title = Some(title);
                }
                if let Some(metadata) = update.metadata {
                    thread.metadata = metadata;
                }
                thread.updated_at = Utc::now();
                tx.execute(
                    "UPDATE threads SET title = ?2, metadata = ?3, updated_at = ?4 WHERE id = ?1",
                    params![
                        thread.id,
                        thread.title,
                        thread.metadata.to_string(),
                        fmt_ts(&thread.updated_at),
                    ],
                )?;
                tx.commit()?;
                Ok(Some(thread))
            })
            .await?;
        updated.ok_or_else(|| Error::not_found(ResourceKind::Thread, id))
    }

    async fn append_turn(&self, new: NewTurn) -> Result<Turn> {
        let thread_id = new.thread_id.clone();
        let turn = Turn {
            id: uuid::Uuid::new_v4().to_string(),
            thread_id: new.thread_id,
            role: new.role,
            content: new.content,
            user_id: new.user_id,
            assistant_id: new.assistant_id,
            metadata: new.metadata,
            completed: true,
            created_at: Utc::now(),
        };
        let row = turn.clone();
        let inserted = self
            .call(move |conn| {
                let tx = conn.transaction()?;
                let exists = tx
                    .query_row("SELECT 1 FROM threads WHERE id = ?1", params![row.thread_id], |_| Ok(()))
                    .optional()?
                    .is_some();
                if !exists {
                    return Ok(false);
                }
                let ts = fmt_ts(&row.created_at);
                tx.execute(
                    "INSERT INTO turns (id, thread_id, role, content, user_id, assistant_id, metadata, completed, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    params![
                        row.id,
                        row.thread_id,
                        row.role.as_str(),
                        row.content,
                        row.user_id,
                        row.assistant_id,
                        row.metadata.as_ref().map(Value::to_string),
                        row.completed,
                        ts,
                    ],
                )?;
                tx.execute(
                    "UPDATE threads SET updated_at = ?2 WHERE id = ?1",
                    params![row.thread_id, ts],
                )?;
                tx.commit()?;
                Ok(true)
            })
            .await?;
        if !inserted {
            return Err(Error::not_found(ResourceKind::Thread, thread_id));
        }
        Ok(turn)
    }

    async fn list_turns(&self, thread_id: &str) -> Result<Vec<Turn>> {
        let thread_id = thread_id.to_string();
        self.call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {TURN_COLUMNS} FROM turns WHERE thread_id = ?1 ORDER BY created_at ASC, rowid ASC"
            ))?;
            let turns = stmt
                .query_map(params![thread_id], turn_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(turns)
        })
        .await
    }

    async fn create_attachment(&self, new: NewAttachment) -> Result<Attachment> {
        let attachment = Attachment {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: new.user_id,
            filename: new.filename,
            storage_path: new.storage_path,
            mime_type: new.mime_type,
            size_bytes: new.size_bytes,
            created_at: Utc::now(),
        };
        let row = attachment.clone();
        self.call(move |conn| {
            conn.execute(
                "INSERT INTO attachments (id, user_id, filename, storage_path, mime_type, size_bytes, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    row.id,
                    row.user_id,
                    row.filename,
                    row.storage_path,
                    row.mime_type,
                    row.size_bytes,
                    fmt_ts(&row.created_at),
                ],
            )
        })
        .await?;
        Ok(attachment)
    }

    async fn get_attachment(&self, id: &str) -> Result<Option<Attachment>> {
        let id = id.to_string();
        self.call(move |conn| {
            conn.query_row(
                &format!("SELECT {ATTACHMENT_COLUMNS} FROM attachments WHERE id = ?1"),
                params![id],
                attachment_from_row,
            )
            .optional()
        })
        .await
    }

    async fn upsert_assistant(&self, profile: AssistantProfile) -> Result<()> {
        let welcome = serde_json::to_string(&profile.welcome_messages)?;
        self.call(move |conn| {
            conn.execute(
                "INSERT INTO assistants (id, name, description, instructions, user_prompt, model, welcome_messages, provider_assistant_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(id) DO UPDATE SET
                   name = excluded.name,
                   description = excluded.description,
                   instructions = excluded.instructions,
                   user_prompt = excluded.user_prompt,
                   model = excluded.model,
                   welcome_messages = excluded.welcome_messages,
                   provider_assistant_id = COALESCE(excluded.provider_assistant_id, assistants.provider_assistant_id)",
                params![
                    profile.id,
                    profile.name,
                    profile.description,
                    profile.instructions,
                    profile.user_prompt,
                    profile.model,
                    welcome,
                    profile.provider_assistant_id,
                ],
            )
        })
        .await?;
        Ok(())
    }

    async fn get_assistant(&self, id: &str) -> Result<Option<AssistantProfile>> {
        let id = id.to_string();
        self.call(move |conn| {
            conn.query_row(
                "SELECT id, name, description, instructions, user_prompt, model, welcome_messages, provider_assistant_id
                 FROM assistants WHERE id = ?1",
                params![id],
                assistant_from_row,
            )
            .optional()
        })
        .await
    }

    async fn set_assistant_provider_id(&self, id: &str, provider_id: &str) -> Result<()> {
        let key = id.to_string();
        let handle = provider_id.to_string();
        let changed = self
            .call(move |conn| {
                conn.execute(
                    "UPDATE assistants SET provider_assistant_id = ?2 WHERE id = ?1",
                    params![key, handle],
                )
            })
            .await?;
        if changed == 0 {
            return Err(Error::not_found(ResourceKind::Assistant, id));
        }
        Ok(())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn new_thread(user: &str, assistant: &str) -> NewThread {
        NewThread {
            user_id: user.into(),
            assistant_id: Some(assistant.into()),
            title: Some("New Chat".into()),
            metadata: Value::Null,
        }
    }

    fn user_turn(thread_id: &str, content: &str) -> NewTurn {
        NewTurn {
            thread_id: thread_id.into(),
            role: Role::User,
            content: content.into(),
            user_id: Some("alice".into()),
            assistant_id: None,
            metadata: None,
        }
    }

    #[tokio::test]
    async fn thread_roundtrip_defaults_metadata_to_object() {
        let store = SqliteChatStore::in_memory().unwrap();
        let created = store.create_thread(new_thread("alice", "a1")).await.unwrap();
        assert_eq!(created.metadata, json!({}));

        let loaded = store.get_thread(&created.id).await.unwrap().unwrap();
        assert_eq!(loaded, created);
        assert!(store.get_thread("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn turns_come_back_in_creation_order() {
        let store = SqliteChatStore::in_memory().unwrap();
        let t = store.create_thread(new_thread("alice", "a1")).await.unwrap();
        for i in 0..5 {
            store
                .append_turn(user_turn(&t.id, &format!("turn {i}")))
                .await
                .unwrap();
        }
        let turns = store.list_turns(&t.id).await.unwrap();
        let contents: Vec<_> = turns.iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, ["turn 0", "turn 1", "turn 2", "turn 3", "turn 4"]);
        assert!(turns.windows(2).all(|w| w[0].created_at <= w[1].created_at));
    }

    #[tokio::test]
    async fn append_turn_bumps_thread_and_reorders_listing() {
        let store = SqliteChatStore::in_memory().unwrap();
        let first = store.create_thread(new_thread("alice", "a1")).await.unwrap();
        let second = store.create_thread(new_thread("alice", "a1")).await.unwrap();

        let listed = store.list_threads("alice", Some("a1")).await.unwrap();
        assert_eq!(listed[0].id, second.id);

        store.append_turn(user_turn(&first.id, "hi")).await.unwrap();
        let listed = store.list_threads("alice", Some("a1")).await.unwrap();
        assert_eq!(listed[0].id, first.id);
        assert!(listed[0].updated_at > first.updated_at);
    }

    #[tokio::test]
    async fn append_turn_to_missing_thread_is_not_found() {
        let store = SqliteChatStore::in_memory().unwrap();
        let err = store.append_turn(user_turn("nope", "hi")).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { kind: ResourceKind::Thread, .. }));
    }

    #[tokio::test]
    async fn list_threads_is_scoped_to_owner_and_assistant() {
        let store = SqliteChatStore::in_memory().unwrap();
        store.create_thread(new_thread("alice", "a1")).await.unwrap();
        store.create_thread(new_thread("alice", "a2")).await.unwrap();
        store.create_thread(new_thread("bob", "a1")).await.unwrap();

        assert_eq!(store.list_threads("alice", Some("a1")).await.unwrap().len(), 1);
        assert_eq!(store.list_threads("alice", None).await.unwrap().len(), 2);
        assert_eq!(store.list_threads("carol", None).await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn update_thread_applies_partial_changes() {
        let store = SqliteChatStore::in_memory().unwrap();
        let t = store.create_thread(new_thread("alice", "a1")).await.unwrap();

        let updated = store
            .update_thread(
                &t.id,
                ThreadUpdate {
                    metadata: Some(json!({"provider_thread_id": "thread_1"})),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.title.as_deref(), Some("New Chat"));
        assert_eq!(updated.provider_handle(), Some("thread_1"));

        let renamed = store
            .update_thread(
                &t.id,
                ThreadUpdate {
                    title: Some("Budget".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(renamed.title.as_deref(), Some("Budget"));
        assert_eq!(renamed.provider_handle(), Some("thread_1"));

        let err = store
            .update_thread("missing", ThreadUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[tokio::test]
    async fn turn_metadata_survives_roundtrip() {
        let store = SqliteChatStore::in_memory().unwrap();
        let t = store.create_thread(new_thread("alice", "a1")).await.unwrap();
        let mut turn = user_turn(&t.id, "with file");
        turn.metadata = Some(json!({"attachment_id": "f1"}));
        store.append_turn(turn).await.unwrap();

        let turns = store.list_turns(&t.id).await.unwrap();
        assert_eq!(turns[0].metadata, Some(json!({"attachment_id": "f1"})));
        assert_eq!(turns[0].role, Role::User);
        assert!(turns[0].completed);
    }

    #[tokio::test]
    async fn attachments_roundtrip() {
        let store = SqliteChatStore::in_memory().unwrap();
        let a = store
            .create_attachment(NewAttachment {
                user_id: "alice".into(),
                filename: "report.pdf".into(),
                storage_path: "alice/report.pdf".into(),
                mime_type: Some("application/pdf".into()),
                size_bytes: Some(1024),
            })
            .await
            .unwrap();
        assert_eq!(store.get_attachment(&a.id).await.unwrap(), Some(a));
        assert!(store.get_attachment("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn upsert_keeps_existing_provider_handle() {
        let store = SqliteChatStore::in_memory().unwrap();
        let profile = AssistantProfile {
            id: "support".into(),
            name: "Support".into(),
            description: None,
            instructions: Some("Be brief.".into()),
            user_prompt: None,
            model: None,
            welcome_messages: vec!["Hi!".into()],
            provider_assistant_id: None,
        };
        store.upsert_assistant(profile.clone()).await.unwrap();
        store.set_assistant_provider_id("support", "asst_1").await.unwrap();

        let mut renamed = profile;
        renamed.name = "Support Desk".into();
        store.upsert_assistant(renamed).await.unwrap();

        let loaded = store.get_assistant("support").await.unwrap().unwrap();
        assert_eq!(loaded.name, "Support Desk");
        assert_eq!(loaded.provider_assistant_id.as_deref(), Some("asst_1"));
        assert_eq!(loaded.welcome_messages, vec!["Hi!"]);

        let err = store.set_assistant_provider_id("ghost", "asst_2").await.unwrap_err();
        assert!(matches!(err, Error::NotFound { kind: ResourceKind::Assistant, .. }));
    }

    #[tokio::test]
    async fn file_backed_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("chat.db");
        let id = {
            let store = SqliteChatStore::open(&path).unwrap();
            store.create_thread(new_thread("alice", "a1")).await.unwrap().id
        };
        let reopened = SqliteChatStore::open(&path).unwrap();
        assert!(reopened.get_thread(&id).await.unwrap().is_some());
    }
}
