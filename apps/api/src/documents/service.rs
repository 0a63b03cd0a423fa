//! Caller-facing document operations: the upload gateway plus listing,
//! retrieval, cancellation and deletion.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{info, warn};

use crate::documents::error::DocumentError;
use crate::documents::models::{Document, DocumentId, DocumentSummary, DocumentView};
use crate::documents::registry::{Cancellation, DocumentRegistry, DocumentStats};
use crate::documents::transfer::{TransferProgress, TransferTracker};
use crate::documents::validation::{validate_upload, UploadMetadata};
use crate::storage::BlobStore;

/// A file as received from the caller.
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    pub filename: String,
    pub mime_type: Option<String>,
    pub bytes: Bytes,
}

pub struct DocumentService {
    registry: Arc<DocumentRegistry>,
    store: Arc<dyn BlobStore>,
    transfers: TransferTracker,
}

impl DocumentService {
    pub fn new(
        registry: Arc<DocumentRegistry>,
        store: Arc<dyn BlobStore>,
        chunk_bytes: usize,
    ) -> Self {
        let transfers = TransferTracker::new(registry.clone(), store.clone(), chunk_bytes);
        Self {
            registry,
            store,
            transfers,
        }
    }

    #[cfg(test)]
    pub fn registry(&self) -> &Arc<DocumentRegistry> {
        &self.registry
    }

    pub fn storage_backend(&self) -> &'static str {
        self.store.backend()
    }

    /// Validates and registers a new document, then starts its transfer in
    /// the background. Rejected submissions leave no trace in the registry.
    pub async fn submit(&self, request: SubmitRequest) -> Result<Document, DocumentError> {
        let meta = UploadMetadata {
            filename: request.filename,
            mime_type: request.mime_type,
        };
        let accepted = validate_upload(&meta, request.bytes.len() as u64)
            .inspect_err(|e| info!("Rejected upload '{}': {e}", meta.filename))?;

        let doc = self
            .registry
            .insert(Document::new(
                DocumentId::new(),
                accepted.filename,
                accepted.kind,
                accepted.size_bytes,
            ))
            .await;
        info!(
            "Accepted {} as {} ({} bytes, {:?})",
            doc.filename, doc.id, doc.size_bytes, doc.kind
        );

        self.transfers.start(&doc, request.bytes);
        Ok(doc)
    }

    pub async fn list(&self) -> Vec<DocumentSummary> {
        self.registry.list().await
    }

    pub async fn get(&self, id: DocumentId) -> Result<DocumentView, DocumentError> {
        self.registry.view(id).await
    }

    pub async fn progress(&self, id: DocumentId) -> Result<TransferProgress, DocumentError> {
        self.transfers.progress(id).await
    }

    /// Removes the record and its stored bytes. Not idempotent.
    pub async fn delete(&self, id: DocumentId) -> Result<(), DocumentError> {
        let doc = self.registry.remove(id).await?;
        self.discard_bytes(&doc).await;
        Ok(())
    }

    pub async fn cancel(&self, id: DocumentId) -> Result<Cancellation, DocumentError> {
        let cancellation = self.registry.cancel(id).await?;
        if let Cancellation::Discarded(doc) = &cancellation {
            self.discard_bytes(doc).await;
        }
        Ok(cancellation)
    }

    pub async fn stats(&self) -> DocumentStats {
        self.registry.stats().await
    }

    /// Best effort: a failed blob delete must not resurrect the record.
    async fn discard_bytes(&self, doc: &Document) {
        if let Err(e) = self.store.delete(&doc.storage_key).await {
            warn!(
                "Could not delete stored bytes for {} ({}): {e}",
                doc.id, doc.storage_key
            );
        }
    }
}
