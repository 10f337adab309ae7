//! Content store: durable blob storage for raw crawl bytes.

use async_trait::async_trait;
use bytes::Bytes;
use sha2::{Digest, Sha256};

use crate::Result;

/// Durable storage of raw crawl bytes, keyed by content path.
///
/// Blobs are expendable after a bounded retention window; the pipeline
/// never depends on blobs older than the most recent successful crawl.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Idempotent overwrite.
    async fn put(&self, path: &str, bytes: Bytes) -> Result<()>;

    /// Fails with [`crate::Error::NotFound`] if absent.
    async fn get(&self, path: &str) -> Result<Bytes>;
}

/// Canonical blob path for one posting URL: `raw/{company}/{hash(url)}`.
///
/// Keying on the URL hash (not the job id) means the same URL across
/// runs shares storage and message redelivery overwrites in place.
pub fn content_path(company: &str, url: &str) -> String {
    let digest = Sha256::digest(url.as_bytes());
    format!("raw/{company}/{}", hex::encode(digest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_shape() {
        let path = content_path("acme", "https://example.com/jobs/1");
        assert!(path.starts_with("raw/acme/"));
        // sha256 hex
        assert_eq!(path.len(), "raw/acme/".len() + 64);
    }

    #[test]
    fn test_same_url_same_path() {
        let url = "https://example.com/jobs/1";
        assert_eq!(content_path("acme", url), content_path("acme", url));
    }

    #[test]
    fn test_company_namespaces_paths() {
        let url = "https://example.com/jobs/1";
        assert_ne!(content_path("acme", url), content_path("globex", url));
    }
}
