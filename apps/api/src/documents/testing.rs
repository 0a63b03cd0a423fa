//! Test doubles shared by the pipeline tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::Semaphore;

use crate::analysis::{AnalysisEngine, AnalysisError, AnalysisOutcome, AnalysisRequest};
use crate::documents::models::{Document, DocumentId, DocumentStatus};
use crate::documents::registry::DocumentRegistry;
use crate::storage::{BlobStore, BlobUpload, StorageError};

const WAIT_LIMIT: Duration = Duration::from_secs(5);

pub fn outcome(score: u8) -> AnalysisOutcome {
    AnalysisOutcome {
        score,
        feedback: vec!["Clear section headings".to_string()],
        suggestions: vec!["Quantify results in the experience section".to_string()],
    }
}

/// Polls until the document reaches `status`. Panics after five seconds.
pub async fn wait_for_status(
    registry: &DocumentRegistry,
    id: DocumentId,
    status: DocumentStatus,
) -> Document {
    let poll = async {
        loop {
            if let Ok(doc) = registry.get(id).await {
                if doc.status() == status {
                    return doc;
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    };
    match tokio::time::timeout(WAIT_LIMIT, poll).await {
        Ok(doc) => doc,
        Err(_) => panic!(
            "document {id} never reached {status}; last seen {:?}",
            registry.get(id).await.map(|d| d.status())
        ),
    }
}

/// Answers immediately with a fixed score or a fixed error.
pub struct ScriptedEngine {
    result: Result<u8, String>,
    calls: AtomicUsize,
}

impl ScriptedEngine {
    pub fn scoring(score: u8) -> Self {
        Self {
            result: Ok(score),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            result: Err(message.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AnalysisEngine for ScriptedEngine {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn analyze(&self, _request: &AnalysisRequest) -> Result<AnalysisOutcome, AnalysisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.result {
            Ok(score) => Ok(outcome(*score)),
            Err(message) => Err(AnalysisError::Engine(message.clone())),
        }
    }
}

/// Blocks every analysis until the test releases it.
pub struct GatedEngine {
    score: u8,
    gate: Semaphore,
    in_flight: Arc<AtomicUsize>,
}

struct InFlight(Arc<AtomicUsize>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl GatedEngine {
    pub fn new(score: u8) -> Self {
        Self {
            score,
            gate: Semaphore::new(0),
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn release(&self, analyses: usize) {
        self.gate.add_permits(analyses);
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub async fn wait_for_in_flight(&self, expected: usize) {
        let poll = async {
            while self.in_flight() != expected {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        };
        if tokio::time::timeout(WAIT_LIMIT, poll).await.is_err() {
            panic!("expected {expected} in-flight analyses, saw {}", self.in_flight());
        }
    }
}

#[async_trait]
impl AnalysisEngine for GatedEngine {
    fn name(&self) -> &'static str {
        "gated"
    }

    async fn analyze(&self, _request: &AnalysisRequest) -> Result<AnalysisOutcome, AnalysisError> {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let _guard = InFlight(self.in_flight.clone());
        self.gate
            .acquire()
            .await
            .map_err(|e| AnalysisError::Engine(e.to_string()))?
            .forget();
        Ok(outcome(self.score))
    }
}

/// Storage that is always down.
pub struct FailingStore;

#[async_trait]
impl BlobStore for FailingStore {
    fn backend(&self) -> &'static str {
        "failing"
    }

    async fn begin_upload(
        &self,
        _key: &str,
        _content_type: &str,
    ) -> Result<Box<dyn BlobUpload>, StorageError> {
        Err(StorageError::Backend("storage unavailable".to_string()))
    }

    async fn get(&self, key: &str) -> Result<Bytes, StorageError> {
        Err(StorageError::NotFound(key.to_string()))
    }

    async fn delete(&self, _key: &str) -> Result<(), StorageError> {
        Ok(())
    }
}

/// Memory storage whose chunk writes wait for the test to open the gate.
pub struct StallingStore {
    pub inner: crate::storage::MemoryBlobStore,
    gate: Arc<Semaphore>,
}

impl StallingStore {
    pub fn new() -> Self {
        Self {
            inner: crate::storage::MemoryBlobStore::new(),
            gate: Arc::new(Semaphore::new(0)),
        }
    }

    /// Lets every pending and future write through.
    pub fn open(&self) {
        self.gate.add_permits(Semaphore::MAX_PERMITS / 2);
    }
}

struct StallingUpload {
    inner: Box<dyn BlobUpload>,
    gate: Arc<Semaphore>,
}

#[async_trait]
impl BlobStore for StallingStore {
    fn backend(&self) -> &'static str {
        "stalling"
    }

    async fn begin_upload(
        &self,
        key: &str,
        content_type: &str,
    ) -> Result<Box<dyn BlobUpload>, StorageError> {
        Ok(Box::new(StallingUpload {
            inner: self.inner.begin_upload(key, content_type).await?,
            gate: self.gate.clone(),
        }))
    }

    async fn get(&self, key: &str) -> Result<Bytes, StorageError> {
        self.inner.get(key).await
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.inner.delete(key).await
    }
}

#[async_trait]
impl BlobUpload for StallingUpload {
    async fn write(&mut self, chunk: Bytes) -> Result<(), StorageError> {
        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        self.inner.write(chunk).await
    }

    async fn finish(self: Box<Self>) -> Result<u64, StorageError> {
        self.inner.finish().await
    }

    async fn abort(self: Box<Self>) {
        self.inner.abort().await
    }
}
