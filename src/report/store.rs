//! Object store seam for generated reports
//!
//! The report generator uploads its artifact and asks for a time-limited
//! retrieval link. Real deployments plug in a cloud object store; the
//! in-memory store backs tests and local runs.

use crate::error::{Result, StreamError};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// An uploaded object
#[derive(Debug, Clone, PartialEq)]
pub struct StoredObject {
    pub bucket: String,
    pub key: String,
    pub content_type: String,
    pub body: Bytes,
}

/// Destination for generated artifacts
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload an object, overwriting any existing object at the key
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
        body: Bytes,
    ) -> Result<()>;

    /// Produce a retrieval link valid for `ttl`
    async fn presign_get(&self, bucket: &str, key: &str, ttl: Duration) -> Result<String>;
}

/// In-memory object store
///
/// Records every upload in order. Presigned links point at a fake
/// `memory://` host carrying the expiry in seconds.
#[derive(Debug, Clone, Default)]
pub struct MemoryObjectStore {
    objects: Arc<RwLock<Vec<StoredObject>>>,
    fail_presign: bool,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose presign step always fails
    pub fn failing_presign() -> Self {
        Self {
            objects: Arc::default(),
            fail_presign: true,
        }
    }

    /// Uploaded objects in upload order
    pub async fn objects(&self) -> Vec<StoredObject> {
        self.objects.read().await.clone()
    }

    pub async fn get(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.objects
            .read()
            .await
            .iter()
            .rev()
            .find(|o| o.bucket == bucket && o.key == key)
            .cloned()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
        body: Bytes,
    ) -> Result<()> {
        tracing::debug!(bucket, key, size = body.len(), "Object stored");
        self.objects.write().await.push(StoredObject {
            bucket: bucket.to_string(),
            key: key.to_string(),
            content_type: content_type.to_string(),
            body,
        });
        Ok(())
    }

    async fn presign_get(&self, bucket: &str, key: &str, ttl: Duration) -> Result<String> {
        if self.fail_presign {
            return Err(StreamError::Storage(format!(
                "presign refused for {}/{}",
                bucket, key
            )));
        }
        Ok(format!(
            "memory://{}/{}?expires={}",
            bucket,
            key,
            ttl.as_secs()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_and_get() {
        let store = MemoryObjectStore::new();
        store
            .put_object("b", "k", "text/markdown", Bytes::from_static(b"v1"))
            .await
            .unwrap();
        store
            .put_object("b", "k", "text/markdown", Bytes::from_static(b"v2"))
            .await
            .unwrap();

        assert_eq!(store.objects().await.len(), 2);
        assert_eq!(store.get("b", "k").await.unwrap().body, Bytes::from_static(b"v2"));
        assert!(store.get("b", "missing").await.is_none());
    }

    #[tokio::test]
    async fn test_presign() {
        let store = MemoryObjectStore::new();
        let url = store
            .presign_get("b", "k", Duration::from_secs(86_400))
            .await
            .unwrap();
        assert_eq!(url, "memory://b/k?expires=86400");

        let failing = MemoryObjectStore::failing_presign();
        let err = failing
            .presign_get("b", "k", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, StreamError::Storage(_)));
    }
}
