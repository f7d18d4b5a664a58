use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Storage
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database holding threads, turns, attachments and assistants.
    #[serde(default = "d_database_path")]
    pub database_path: PathBuf,
    /// Root directory of the blob store; attachment `storage_path`s are
    /// relative to it.
    #[serde(default = "d_blob_root")]
    pub blob_root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: d_database_path(),
            blob_root: d_blob_root(),
        }
    }
}

fn d_database_path() -> PathBuf {
    PathBuf::from("./data/widgetchat.db")
}
fn d_blob_root() -> PathBuf {
    PathBuf::from("./data/files")
}
