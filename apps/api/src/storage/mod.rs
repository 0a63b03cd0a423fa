//! Blob storage for raw document bytes.
//!
//! Documents only keep a key into the store. Uploads are chunked so the
//! transfer tracker can report progress as bytes land.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use thiserror::Error;
use tokio::sync::RwLock;

pub mod fs;
pub mod s3;

pub use fs::FsBlobStore;
pub use s3::S3BlobStore;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    fn backend(&self) -> &'static str;

    /// Opens an upload for `key`. Nothing is visible under `key` until
    /// [`BlobUpload::finish`] succeeds.
    async fn begin_upload(
        &self,
        key: &str,
        content_type: &str,
    ) -> Result<Box<dyn BlobUpload>, StorageError>;

    async fn get(&self, key: &str) -> Result<Bytes, StorageError>;

    /// Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// An in-progress upload.
#[async_trait]
pub trait BlobUpload: Send {
    async fn write(&mut self, chunk: Bytes) -> Result<(), StorageError>;

    /// Publishes the object and returns its size in bytes.
    async fn finish(self: Box<Self>) -> Result<u64, StorageError>;

    /// Discards anything written so far.
    async fn abort(self: Box<Self>);
}

/// Rejects keys that could escape a storage root or address nothing.
pub(crate) fn check_key(key: &str) -> Result<(), StorageError> {
    let bad = key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..");
    if bad {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// Process-local store. The default backend for development and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryBlobStore {
    objects: Arc<RwLock<HashMap<String, Bytes>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub async fn contains(&self, key: &str) -> bool {
        self.objects.read().await.contains_key(key)
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn begin_upload(
        &self,
        key: &str,
        _content_type: &str,
    ) -> Result<Box<dyn BlobUpload>, StorageError> {
        check_key(key)?;
        Ok(Box::new(MemoryUpload {
            objects: self.objects.clone(),
            key: key.to_string(),
            buffer: BytesMut::new(),
        }))
    }

    async fn get(&self, key: &str) -> Result<Bytes, StorageError> {
        self.objects
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.objects.write().await.remove(key);
        Ok(())
    }
}

struct MemoryUpload {
    objects: Arc<RwLock<HashMap<String, Bytes>>>,
    key: String,
    buffer: BytesMut,
}

#[async_trait]
impl BlobUpload for MemoryUpload {
    async fn write(&mut self, chunk: Bytes) -> Result<(), StorageError> {
        self.buffer.extend_from_slice(&chunk);
        Ok(())
    }

    async fn finish(self: Box<Self>) -> Result<u64, StorageError> {
        let size = self.buffer.len() as u64;
        self.objects
            .write()
            .await
            .insert(self.key, self.buffer.freeze());
        Ok(size)
    }

    async fn abort(self: Box<Self>) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_key() {
        assert!(check_key("documents/abc").is_ok());
        for bad in ["", "/etc/passwd", "documents/../x", "a//b", "a\\b", "./a"] {
            assert!(check_key(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[tokio::test]
    async fn test_memory_upload_is_invisible_until_finished() {
        let store = MemoryBlobStore::new();
        let mut upload = store
            .begin_upload("documents/a", "application/pdf")
            .await
            .unwrap();
        upload.write(Bytes::from_static(b"%PDF-")).await.unwrap();
        upload.write(Bytes::from_static(b"1.7")).await.unwrap();
        assert!(!store.contains("documents/a").await);

        assert_eq!(upload.finish().await.unwrap(), 8);
        assert_eq!(
            store.get("documents/a").await.unwrap(),
            Bytes::from_static(b"%PDF-1.7")
        );
    }

    #[tokio::test]
    async fn test_memory_abort_and_delete() {
        let store = MemoryBlobStore::new();
        let mut upload = store.begin_upload("documents/b", "x").await.unwrap();
        upload.write(Bytes::from_static(b"data")).await.unwrap();
        upload.abort().await;
        assert_eq!(store.len().await, 0);

        assert!(matches!(
            store.get("documents/b").await,
            Err(StorageError::NotFound(_))
        ));
        store.delete("documents/b").await.unwrap();
    }
}
