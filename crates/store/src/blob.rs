//! Blob storage for attachment bytes.

use std::path::{Component, Path, PathBuf};

use wc_domain::error::{Error, Result};

/// Byte storage addressed by relative paths.
#[async_trait::async_trait]
pub trait BlobStore: Send + Sync {
    async fn get(&self, path: &str) -> Result<Vec<u8>>;

    async fn put(&self, path: &str, bytes: &[u8]) -> Result<()>;
}

/// Blobs as plain files under a root directory.
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve `path` under the root, rejecting anything that could escape it.
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let rel = Path::new(path);
        let clean = !path.is_empty()
            && rel
                .components()
                .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !clean {
            return Err(Error::Storage(format!("invalid blob path '{path}'")));
        }
        Ok(self.root.join(rel))
    }
}

#[async_trait::async_trait]
impl BlobStore for LocalBlobStore {
    async fn get(&self, path: &str) -> Result<Vec<u8>> {
        let full = self.resolve(path)?;
        tokio::fs::read(&full)
            .await
            .map_err(|e| Error::Storage(format!("failed to read blob '{path}': {e}")))
    }

    async fn put(&self, path: &str, bytes: &[u8]) -> Result<()> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full, bytes)
            .await
            .map_err(|e| Error::Storage(format!("failed to write blob '{path}': {e}")))
    }
}
