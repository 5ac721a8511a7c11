use crate::shared::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// BlobStore port for raw scan reports and failure records
///
/// Paths are relative object names such as `<cacheKey>/<scanId>.json`;
/// the bucket or root directory is adapter configuration.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Writes `body` at `path`, replacing any existing object
    async fn put(&self, path: &str, content_type: &str, body: Vec<u8>) -> Result<()>;

    /// Reads the object at `path`, or `None` when it does not exist
    async fn get(&self, path: &str) -> Result<Option<Vec<u8>>>;
}

#[async_trait]
impl<T: BlobStore + ?Sized> BlobStore for Arc<T> {
    async fn put(&self, path: &str, content_type: &str, body: Vec<u8>) -> Result<()> {
        (**self).put(path, content_type, body).await
    }

    async fn get(&self, path: &str) -> Result<Option<Vec<u8>>> {
        (**self).get(path).await
    }
}
