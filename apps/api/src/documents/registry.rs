//! Document registry and state machine.
//!
//! One lock guards both the document map and the FIFO analysis queue, so
//! every status change, result write, and deletion is serialized. A delete
//! racing a worker's completion write resolves cleanly: whichever runs second
//! sees `NotFound` or a terminal state and backs off.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, RwLock, Semaphore};
use tracing::{debug, info};

use crate::analysis::rating::ScoreLabel;
use crate::analysis::AnalysisOutcome;
use crate::documents::error::DocumentError;
use crate::documents::events::DocumentEvent;
use crate::documents::models::{
    Document, DocumentId, DocumentState, DocumentStatus, DocumentSummary, DocumentView,
    FailureReason,
};

const EVENT_CAPACITY: usize = 1024;

#[derive(Default)]
struct RegistryInner {
    documents: HashMap<DocumentId, Document>,
    /// Queued documents in arrival order.
    queue: VecDeque<DocumentId>,
    next_seq: u64,
}

impl RegistryInner {
    fn get_mut(&mut self, id: DocumentId) -> Result<&mut Document, DocumentError> {
        self.documents
            .get_mut(&id)
            .ok_or(DocumentError::NotFound(id))
    }

    fn dequeue(&mut self, id: DocumentId) {
        self.queue.retain(|queued| *queued != id);
    }
}

/// Result of a caller-initiated cancel.
#[derive(Debug, Clone)]
pub enum Cancellation {
    /// The document was still uploading and has been removed entirely.
    Discarded(Document),
    /// The document was queued or analyzing and is now `Failed{Cancelled}`.
    Failed { previous: DocumentStatus },
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DocumentStats {
    pub total: usize,
    pub by_status: BTreeMap<&'static str, usize>,
    pub by_label: BTreeMap<&'static str, usize>,
    /// Mean score over completed documents.
    pub average_score: Option<f64>,
}

pub struct DocumentRegistry {
    inner: RwLock<RegistryInner>,
    events: broadcast::Sender<DocumentEvent>,
    /// One permit per arrival in the queue; workers wait on it.
    ready: Arc<Semaphore>,
}

impl Default for DocumentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentRegistry {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: RwLock::new(RegistryInner::default()),
            events,
            ready: Arc::new(Semaphore::new(0)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DocumentEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: DocumentEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    pub async fn insert(&self, mut doc: Document) -> Document {
        let mut inner = self.inner.write().await;
        doc.seq = inner.next_seq;
        inner.next_seq += 1;

        self.emit(DocumentEvent::Created {
            document_id: doc.id,
            filename: doc.filename.clone(),
        });
        inner.documents.insert(doc.id, doc.clone());
        doc
    }

    pub async fn get(&self, id: DocumentId) -> Result<Document, DocumentError> {
        self.inner
            .read()
            .await
            .documents
            .get(&id)
            .cloned()
            .ok_or(DocumentError::NotFound(id))
    }

    pub async fn view(&self, id: DocumentId) -> Result<DocumentView, DocumentError> {
        let inner = self.inner.read().await;
        let doc = inner.documents.get(&id).ok_or(DocumentError::NotFound(id))?;
        let position = inner.queue.iter().position(|queued| *queued == id);
        Ok(DocumentView::new(doc, position))
    }

    /// Most recent upload first.
    pub async fn list(&self) -> Vec<DocumentSummary> {
        let inner = self.inner.read().await;
        let mut docs: Vec<&Document> = inner.documents.values().collect();
        docs.sort_by(|a, b| {
            b.uploaded_at
                .cmp(&a.uploaded_at)
                .then_with(|| b.seq.cmp(&a.seq))
        });
        docs.into_iter().map(DocumentSummary::from).collect()
    }

    /// Queued document ids in the order workers will pick them up.
    #[cfg(test)]
    pub async fn queued(&self) -> Vec<DocumentId> {
        self.inner.read().await.queue.iter().copied().collect()
    }

    /// Records transfer progress. Stale or out-of-state updates are ignored;
    /// `NotFound` tells the transfer its document is gone.
    pub async fn record_progress(&self, id: DocumentId, percent: u8) -> Result<(), DocumentError> {
        let mut inner = self.inner.write().await;
        let doc = inner.get_mut(id)?;
        if let Some(percent) = doc.record_progress(percent) {
            debug!("Document {id} transfer at {percent}%");
            self.emit(DocumentEvent::Progress {
                document_id: id,
                percent,
            });
        }
        Ok(())
    }

    /// `Uploading -> Queued`, appending to the back of the queue.
    pub async fn mark_queued(&self, id: DocumentId) -> Result<(), DocumentError> {
        let mut inner = self.inner.write().await;
        let from = inner.get_mut(id)?.transition(DocumentState::Queued)?;
        inner.queue.push_back(id);
        let position = inner.queue.len() - 1;

        self.emit(DocumentEvent::StatusChanged {
            document_id: id,
            from,
            to: DocumentStatus::Queued,
        });
        self.ready.add_permits(1);
        info!("Document {id} queued at position {position}");
        Ok(())
    }

    /// Waits until something may be queued. Returns `false` once the
    /// registry is closed.
    pub async fn wait_ready(&self) -> bool {
        match self.ready.acquire().await {
            Ok(permit) => {
                permit.forget();
                true
            }
            Err(_) => false,
        }
    }

    /// Stops waking workers. Queued documents stay `Queued`.
    pub fn close(&self) {
        self.ready.close();
    }

    /// Pops the oldest queued document and moves it to `Analyzing` in one step.
    pub async fn claim_next(&self) -> Option<Document> {
        let mut inner = self.inner.write().await;
        while let Some(id) = inner.queue.pop_front() {
            let Some(doc) = inner.documents.get_mut(&id) else {
                continue;
            };
            let Ok(from) = doc.transition(DocumentState::Analyzing) else {
                continue;
            };
            let claimed = doc.clone();
            self.emit(DocumentEvent::StatusChanged {
                document_id: id,
                from,
                to: DocumentStatus::Analyzing,
            });
            return Some(claimed);
        }
        None
    }

    /// `Analyzing -> Completed`, attaching the engine's result.
    pub async fn complete(
        &self,
        id: DocumentId,
        outcome: AnalysisOutcome,
    ) -> Result<(), DocumentError> {
        let mut inner = self.inner.write().await;
        let doc = inner.get_mut(id)?;
        let score = outcome.score;
        let from = doc.transition(DocumentState::Completed(outcome))?;

        self.emit(DocumentEvent::StatusChanged {
            document_id: id,
            from,
            to: DocumentStatus::Completed,
        });
        info!("Document {id} completed with score {score}");
        Ok(())
    }

    /// Any live state `-> Failed`. Returns the status the document left.
    pub async fn fail(
        &self,
        id: DocumentId,
        reason: FailureReason,
    ) -> Result<DocumentStatus, DocumentError> {
        let mut inner = self.inner.write().await;
        let doc = inner.get_mut(id)?;
        let message = reason.to_string();
        let from = doc.transition(DocumentState::Failed(reason))?;
        inner.dequeue(id);

        self.emit(DocumentEvent::StatusChanged {
            document_id: id,
            from,
            to: DocumentStatus::Failed,
        });
        info!("Document {id} failed while {from}: {message}");
        Ok(from)
    }

    /// Cancel: an uploading document is discarded, a queued or analyzing one
    /// fails with `Cancelled`, a terminal one is left alone.
    pub async fn cancel(&self, id: DocumentId) -> Result<Cancellation, DocumentError> {
        let mut inner = self.inner.write().await;
        let doc = inner.get_mut(id)?;

        if doc.status() == DocumentStatus::Uploading {
            let removed = inner
                .documents
                .remove(&id)
                .ok_or(DocumentError::NotFound(id))?;
            self.emit(DocumentEvent::Deleted { document_id: id });
            info!("Document {id} cancelled during upload and discarded");
            return Ok(Cancellation::Discarded(removed));
        }

        let previous = doc.transition(DocumentState::Failed(FailureReason::Cancelled))?;
        inner.dequeue(id);
        self.emit(DocumentEvent::StatusChanged {
            document_id: id,
            from: previous,
            to: DocumentStatus::Failed,
        });
        info!("Document {id} cancelled while {previous}");
        Ok(Cancellation::Failed { previous })
    }

    pub async fn remove(&self, id: DocumentId) -> Result<Document, DocumentError> {
        let mut inner = self.inner.write().await;
        let doc = inner
            .documents
            .remove(&id)
            .ok_or(DocumentError::NotFound(id))?;
        inner.dequeue(id);

        self.emit(DocumentEvent::Deleted { document_id: id });
        info!("Document {id} deleted while {}", doc.status());
        Ok(doc)
    }

    pub async fn stats(&self) -> DocumentStats {
        let inner = self.inner.read().await;

        let mut by_status: BTreeMap<&'static str, usize> =
            DocumentStatus::ALL.iter().map(|s| (s.as_str(), 0)).collect();
        let mut by_label: BTreeMap<&'static str, usize> =
            ScoreLabel::ALL.iter().map(|l| (l.as_str(), 0)).collect();
        let mut score_sum = 0u64;
        let mut scored = 0u64;

        for doc in inner.documents.values() {
            *by_status.entry(doc.status().as_str()).or_default() += 1;
            if let Some(outcome) = doc.outcome() {
                *by_label
                    .entry(ScoreLabel::from_score(outcome.score).as_str())
                    .or_default() += 1;
                score_sum += u64::from(outcome.score);
                scored += 1;
            }
        }

        DocumentStats {
            total: inner.documents.len(),
            by_status,
            by_label,
            average_score: (scored > 0).then(|| score_sum as f64 / scored as f64),
        }
    }
}
