//! Attachment Resolver: from a stored file record to a provider file handle.

use std::time::Instant;

use wc_domain::error::Result;
use wc_domain::model::Attachment;
use wc_providers::{AssistantsApi, FileUpload};
use wc_store::BlobStore;

#[derive(Debug, Clone)]
pub struct ResolvedAttachment {
    pub attachment: Attachment,
    pub file_id: String,
}

/// Download an attachment that already passed
/// [`access::attachment`](super::access::attachment) and
/// upload it to the provider.
///
/// The ownership check stays separate so it can run before any provider
/// call is made for the request.
pub async fn resolve(
    blobs: &dyn BlobStore,
    provider: &dyn AssistantsApi,
    attachment: Attachment,
) -> Result<ResolvedAttachment> {
    let started = Instant::now();
    let bytes = blobs.get(&attachment.storage_path).await?;
    let size = bytes.len();
    let file_id = provider
        .upload_file(FileUpload {
            filename: attachment.filename.clone(),
            mime_type: attachment.mime_type.clone(),
            bytes,
        })
        .await?;
    tracing::info!(
        attachment_id = %attachment.id,
        file_id = %file_id,
        size,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "attachment uploaded to provider"
    );
    Ok(ResolvedAttachment {
        attachment,
        file_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;
    use crate::runtime::access;
    use wc_domain::error::Error;
    use wc_domain::model::{NewAttachment, Principal};
    use wc_store::ChatStore;
    use wc_providers::ScriptedProvider;
    use wc_store::{LocalBlobStore, SqliteChatStore};

    async fn fixture(dir: &std::path::Path) -> (SqliteChatStore, LocalBlobStore, Attachment) {
        let store = SqliteChatStore::in_memory().unwrap();
        let blobs = LocalBlobStore::new(dir);
        blobs.put("alice/data.csv", b"x,y\n1,2\n").await.unwrap();
        let attachment = store
            .create_attachment(NewAttachment {
                user_id: "alice".into(),
                filename: "data.csv".into(),
                storage_path: "alice/data.csv".into(),
                mime_type: Some("text/csv".into()),
                size_bytes: Some(8),
            })
            .await
            .unwrap();
        (store, blobs, attachment)
    }

    #[tokio::test]
    async fn uploads_blob_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let (store, blobs, attachment) = fixture(dir.path()).await;
        let provider = ScriptedProvider::new();

        let gated = access::attachment(&store, &Principal::new("alice"), &attachment.id)
            .await
            .unwrap();
        let resolved = resolve(&blobs, &provider, gated).await.unwrap();
        assert_eq!(resolved.attachment.id, attachment.id);
        assert!(resolved.file_id.starts_with("file_"));
        let uploads = provider.uploaded_files();
        assert_eq!(uploads[0].filename, "data.csv");
        assert_eq!(uploads[0].bytes, b"x,y\n1,2\n");
    }

    #[tokio::test]
    async fn foreign_attachment_is_denied_without_upload() {
        let dir = tempfile::tempdir().unwrap();
        let (store, blobs, attachment) = fixture(dir.path()).await;
        let provider = ScriptedProvider::new();

        let err = access::attachment(&store, &Principal::new("bob"), &attachment.id)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AccessDenied { .. }));
        assert!(blobs.get(&attachment.storage_path).await.is_ok());
        assert_eq!(provider.calls.total(), 0);
    }

    #[tokio::test]
    async fn missing_blob_is_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _, _) = fixture(dir.path()).await;
        let empty = tempfile::tempdir().unwrap();
        let blobs = LocalBlobStore::new(empty.path());
        let attachment = store
            .create_attachment(NewAttachment {
                user_id: "alice".into(),
                filename: "gone.pdf".into(),
                storage_path: "alice/gone.pdf".into(),
                mime_type: None,
                size_bytes: None,
            })
            .await
            .unwrap();
        let provider = ScriptedProvider::new();

        let err = resolve(&blobs, &provider, attachment).await.unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
        assert_eq!(provider.calls.upload_file.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn provider_upload_failure_is_provider_error() {
        let dir = tempfile::tempdir().unwrap();
        let (_store, blobs, attachment) = fixture(dir.path()).await;
        let provider = ScriptedProvider::new().failing_uploads();

        let err = resolve(&blobs, &provider, attachment).await.unwrap_err();
        assert!(matches!(err, Error::Provider { .. }));
    }
}
