//! Transfer Tracker: moves accepted upload bytes into blob storage.
//!
//! Progress is reported per chunk and held below 100 until storage has
//! acknowledged the finished object; only then does the single
//! `Uploading -> Queued` completion happen. Cancellation is cooperative: a
//! cancelled or deleted document disappears from the registry, the next
//! progress report comes back `NotFound`, and the transfer aborts its upload.

use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::documents::error::DocumentError;
use crate::documents::models::{Document, DocumentId, DocumentStatus, FailureReason};
use crate::documents::registry::DocumentRegistry;
use crate::storage::{BlobStore, StorageError};

pub const DEFAULT_CHUNK_BYTES: usize = 64 * 1024;

/// Snapshot of a transfer. `finished` flips once the document has left
/// `Uploading`, whether it was queued or failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TransferProgress {
    pub document_id: DocumentId,
    pub percent: u8,
    pub finished: bool,
}

enum TransferOutcome {
    Stored(u64),
    /// The document went away mid-transfer; nothing was published.
    Abandoned,
}

#[derive(Clone)]
pub struct TransferTracker {
    registry: Arc<DocumentRegistry>,
    store: Arc<dyn BlobStore>,
    chunk_bytes: usize,
}

impl TransferTracker {
    pub fn new(registry: Arc<DocumentRegistry>, store: Arc<dyn BlobStore>, chunk_bytes: usize) -> Self {
        Self {
            registry,
            store,
            chunk_bytes: chunk_bytes.max(1),
        }
    }

    /// Starts moving `data` into storage for an `Uploading` document.
    /// Returns immediately; the handle resolves once the document is queued,
    /// failed, or abandoned.
    pub fn start(&self, doc: &Document, data: Bytes) -> JoinHandle<()> {
        let tracker = self.clone();
        let id = doc.id;
        let key = doc.storage_key.clone();
        let content_type = doc.mime_type.clone();

        tokio::spawn(async move { tracker.run(id, &key, &content_type, data).await })
    }

    pub async fn progress(&self, id: DocumentId) -> Result<TransferProgress, DocumentError> {
        let doc = self.registry.get(id).await?;
        Ok(TransferProgress {
            document_id: id,
            percent: doc.progress,
            finished: doc.status() != DocumentStatus::Uploading,
        })
    }

    async fn run(&self, id: DocumentId, key: &str, content_type: &str, data: Bytes) {
        match self.transfer(id, key, content_type, &data).await {
            Ok(TransferOutcome::Stored(size)) => {
                if let Err(e) = self.registry.mark_queued(id).await {
                    // Cancelled or deleted between the last chunk and now.
                    info!("Dropping stored bytes for {id}: {e}");
                    self.discard(key).await;
                    return;
                }
                info!("Transfer of {id} complete ({size} bytes)");
            }
            Ok(TransferOutcome::Abandoned) => {
                info!("Transfer of {id} abandoned");
            }
            Err(e) => {
                warn!("Transfer of {id} failed: {e}");
                let reason = FailureReason::Transfer {
                    message: e.to_string(),
                };
                if let Err(e) = self.registry.fail(id, reason).await {
                    debug!("Could not record transfer failure for {id}: {e}");
                }
            }
        }
    }

    async fn transfer(
        &self,
        id: DocumentId,
        key: &str,
        content_type: &str,
        data: &Bytes,
    ) -> Result<TransferOutcome, StorageError> {
        let total = data.len();
        let mut upload = self.store.begin_upload(key, content_type).await?;

        for start in (0..total).step_by(self.chunk_bytes) {
            let end = (start + self.chunk_bytes).min(total);
            if let Err(e) = upload.write(data.slice(start..end)).await {
                upload.abort().await;
                return Err(e);
            }

            let percent = progress_percent(end, total);
            if let Err(DocumentError::NotFound(_)) = self.registry.record_progress(id, percent).await
            {
                upload.abort().await;
                return Ok(TransferOutcome::Abandoned);
            }
        }

        let size = upload.finish().await?;
        Ok(TransferOutcome::Stored(size))
    }

    async fn discard(&self, key: &str) {
        if let Err(e) = self.store.delete(key).await {
            warn!("Failed to delete orphaned object {key}: {e}");
        }
    }
}

/// Percent of bytes handed to storage, capped at 99 until the object is
/// published.
fn progress_percent(written: usize, total: usize) -> u8 {
    if total == 0 {
        return 99;
    }
    let percent = (written as u128 * 100 / total as u128).min(99);
    percent as u8
}
