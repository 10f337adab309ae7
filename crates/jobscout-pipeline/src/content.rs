//! Content store implementations.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;

use jobscout_core::content::ContentStore;
use jobscout_core::{Error, Result};

/// Blob store rooted at a local directory. Overwrites go through a
/// temp file and rename so readers never observe a partial blob.
pub struct FsContentStore {
    root: PathBuf,
}

impl FsContentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> Result<PathBuf> {
        // Paths come from `content_path` and are relative; anything
        // trying to walk out of the root is malformed.
        let rel = Path::new(path);
        if rel.is_absolute()
            || rel
                .components()
                .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return Err(Error::Format(format!("invalid content path: {path}")));
        }
        Ok(self.root.join(rel))
    }
}

/// Per-process sequence for temp-file names. Redelivery means two
/// workers can write the same target concurrently; they must never
/// share a temp path.
static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

#[async_trait]
impl ContentStore for FsContentStore {
    async fn put(&self, path: &str, bytes: Bytes) -> Result<()> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::Internal(format!("content store mkdir: {e}")))?;
        }

        let tmp = target.with_extension(format!(
            "tmp.{}.{}",
            std::process::id(),
            TMP_SEQ.fetch_add(1, Ordering::Relaxed)
        ));
        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|e| Error::Internal(format!("content store write: {e}")))?;
        tokio::fs::rename(&tmp, &target)
            .await
            .map_err(|e| Error::Internal(format!("content store rename: {e}")))?;
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Bytes> {
        let target = self.resolve(path)?;
        match tokio::fs::read(&target).await {
            Ok(bytes) => Ok(Bytes::from(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::NotFound(format!("blob {path}")))
            }
            Err(e) => Err(Error::Internal(format!("content store read: {e}"))),
        }
    }
}

/// In-memory store for tests.
#[derive(Default)]
pub struct MemContentStore {
    blobs: RwLock<HashMap<String, Bytes>>,
}

impl MemContentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ContentStore for MemContentStore {
    async fn put(&self, path: &str, bytes: Bytes) -> Result<()> {
        let mut blobs = self
            .blobs
            .write()
            .map_err(|_| Error::Internal("content store lock poisoned".into()))?;
        blobs.insert(path.to_string(), bytes);
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Bytes> {
        let blobs = self
            .blobs
            .read()
            .map_err(|_| Error::Internal("content store lock poisoned".into()))?;
        blobs
            .get(path)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("blob {path}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mem_put_get_overwrite() {
        let store = MemContentStore::new();
        store
            .put("raw/acme/abc", Bytes::from_static(b"first"))
            .await
            .unwrap();
        store
            .put("raw/acme/abc", Bytes::from_static(b"second"))
            .await
            .unwrap();
        assert_eq!(store.get("raw/acme/abc").await.unwrap().as_ref(), b"second");
    }

    #[tokio::test]
    async fn test_mem_missing_blob_is_not_found() {
        let store = MemContentStore::new();
        assert!(matches!(
            store.get("raw/acme/missing").await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_fs_round_trip() {
        let root = std::env::temp_dir().join(format!("jobscout-content-{}", std::process::id()));
        let store = FsContentStore::new(&root);

        store
            .put("raw/acme/abc", Bytes::from_static(b"payload"))
            .await
            .unwrap();
        assert_eq!(store.get("raw/acme/abc").await.unwrap().as_ref(), b"payload");
        assert!(matches!(
            store.get("raw/acme/other").await,
            Err(Error::NotFound(_))
        ));

        let _ = tokio::fs::remove_dir_all(&root).await;
    }

    #[tokio::test]
    async fn test_fs_rejects_escaping_paths() {
        let store = FsContentStore::new("/tmp/jobscout-content");
        assert!(store.get("../etc/passwd").await.is_err());
        assert!(store.get("/etc/passwd").await.is_err());
    }
}
