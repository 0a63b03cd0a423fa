use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use super::{check_key, BlobStore, BlobUpload, StorageError};

/// Stores objects as files under a root directory. Uploads go to a
/// `.part` sibling and are renamed into place on finish.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        info!("Filesystem storage rooted at {}", root.display());
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        check_key(key)?;
        Ok(self.root.join(key))
    }
}

fn part_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

#[async_trait]
impl BlobStore for FsBlobStore {
    fn backend(&self) -> &'static str {
        "fs"
    }

    async fn begin_upload(
        &self,
        key: &str,
        _content_type: &str,
    ) -> Result<Box<dyn BlobUpload>, StorageError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let part = part_path(&path);
        let file = File::create(&part).await?;
        Ok(Box::new(FsUpload {
            file,
            part,
            path,
            written: 0,
        }))
    }

    async fn get(&self, key: &str) -> Result<Bytes, StorageError> {
        let path = self.path_for(key)?;
        match fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

struct FsUpload {
    file: File,
    part: PathBuf,
    path: PathBuf,
    written: u64,
}

#[async_trait]
impl BlobUpload for FsUpload {
    async fn write(&mut self, chunk: Bytes) -> Result<(), StorageError> {
        self.file.write_all(&chunk).await?;
        self.written += chunk.len() as u64;
        Ok(())
    }

    async fn finish(mut self: Box<Self>) -> Result<u64, StorageError> {
        self.file.flush().await?;
        self.file.sync_all().await?;
        fs::rename(&self.part, &self.path).await?;
        Ok(self.written)
    }

    async fn abort(self: Box<Self>) {
        let FsUpload { file, part, .. } = *self;
        drop(file);
        if let Err(e) = fs::remove_file(&part).await {
            if e.kind() != ErrorKind::NotFound {
                warn!("Failed to remove partial upload {}: {e}", part.display());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upload_then_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path()).await.unwrap();

        let mut upload = store
            .begin_upload("documents/one", "application/pdf")
            .await
            .unwrap();
        upload.write(Bytes::from_static(b"hello ")).await.unwrap();
        upload.write(Bytes::from_static(b"world")).await.unwrap();
        assert!(!dir.path().join("documents/one").exists());
        assert!(dir.path().join("documents/one.part").exists());

        assert_eq!(upload.finish().await.unwrap(), 11);
        assert_eq!(
            store.get("documents/one").await.unwrap(),
            Bytes::from_static(b"hello world")
        );
        assert!(!dir.path().join("documents/one.part").exists());
    }

    #[tokio::test]
    async fn test_abort_removes_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path()).await.unwrap();

        let mut upload = store.begin_upload("documents/two", "x").await.unwrap();
        upload.write(Bytes::from_static(b"partial")).await.unwrap();
        upload.abort().await;

        assert!(!dir.path().join("documents/two.part").exists());
        assert!(matches!(
            store.get("documents/two").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_is_tolerant_of_missing_objects() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path()).await.unwrap();
        store.delete("documents/missing").await.unwrap();
    }

    #[tokio::test]
    async fn test_rejects_escaping_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path()).await.unwrap();
        assert!(matches!(
            store.get("../secret").await,
            Err(StorageError::InvalidKey(_))
        ));
    }
}
