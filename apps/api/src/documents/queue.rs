//! Bounded analysis worker pool.
//!
//! `N` workers share the registry's FIFO queue. Each worker handles one
//! document at a time, so at most `N` documents are `Analyzing` and the rest
//! wait `Queued` in arrival order. There are no retries; a failed document
//! stays failed.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::analysis::{AnalysisEngine, AnalysisOutcome, AnalysisRequest};
use crate::documents::models::{Document, FailureReason};
use crate::documents::registry::DocumentRegistry;
use crate::storage::BlobStore;

pub struct AnalysisQueue {
    registry: Arc<DocumentRegistry>,
    store: Arc<dyn BlobStore>,
    engine: Arc<dyn AnalysisEngine>,
    /// Budget for reading the stored bytes plus the engine call.
    timeout: Duration,
}

impl AnalysisQueue {
    pub fn new(
        registry: Arc<DocumentRegistry>,
        store: Arc<dyn BlobStore>,
        engine: Arc<dyn AnalysisEngine>,
        timeout: Duration,
    ) -> Self {
        Self {
            registry,
            store,
            engine,
            timeout,
        }
    }

    /// Spawns `workers` (at least one) worker tasks. They exit once the
    /// registry is closed, finishing the document in hand first.
    pub fn spawn_workers(self: &Arc<Self>, workers: usize) -> Vec<JoinHandle<()>> {
        let workers = workers.max(1);
        info!(
            "Starting {workers} analysis workers (engine: {}, timeout: {}s)",
            self.engine.name(),
            self.timeout.as_secs()
        );
        (0..workers)
            .map(|worker| {
                let queue = Arc::clone(self);
                tokio::spawn(async move { queue.worker_loop(worker).await })
            })
            .collect()
    }

    async fn worker_loop(&self, worker: usize) {
        while self.registry.wait_ready().await {
            // A wake-up can outlive its document (cancelled or deleted while
            // queued); claim_next then simply finds nothing.
            if let Some(doc) = self.registry.claim_next().await {
                info!("Worker {worker} analyzing {} ({})", doc.id, doc.filename);
                self.process(doc).await;
            }
        }
        info!("Worker {worker} stopped");
    }

    async fn process(&self, doc: Document) {
        let id = doc.id;
        let result = match tokio::time::timeout(self.timeout, self.analyze(&doc)).await {
            Ok(result) => result,
            Err(_) => Err(FailureReason::Timeout),
        };

        let recorded = match result {
            Ok(outcome) => self.registry.complete(id, outcome).await,
            Err(reason) => self.registry.fail(id, reason).await.map(|_| ()),
        };
        if let Err(e) = recorded {
            // Cancelled or deleted while the engine was busy.
            info!("Discarding analysis result for {id}: {e}");
        }
    }

    async fn analyze(&self, doc: &Document) -> Result<AnalysisOutcome, FailureReason> {
        let bytes = self.store.get(&doc.storage_key).await.map_err(|e| {
            warn!("Could not read {} from storage: {e}", doc.storage_key);
            FailureReason::Analysis {
                message: format!("stored document unreadable: {e}"),
            }
        })?;

        let request = AnalysisRequest {
            document_id: doc.id,
            filename: doc.filename.clone(),
            kind: doc.kind,
            bytes,
        };

        self.engine.analyze(&request).await.map_err(|e| {
            warn!("Analysis of {} failed: {e}", doc.id);
            FailureReason::Analysis {
                message: e.to_string(),
            }
        })
    }
}
