use crate::scan_orchestration::domain::{ScanCacheKey, ScanMetadataRecord};
use crate::shared::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// MetadataStore port for the queryable scan metadata collection
///
/// Records are append-only and keyed by scan id. The dedup cache only ever
/// asks for the newest record of one cache key, so implementations must be
/// able to order a key's records by `timestampStr`.
///
/// Implementations must be `Send + Sync` so images can be processed concurrently.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Returns the most recent record for `key`, if any
    ///
    /// # Errors
    /// Returns an error if the store cannot be queried or a stored record
    /// cannot be decoded. Callers treat lookup errors as a cache miss.
    async fn latest_for(&self, key: &ScanCacheKey) -> Result<Option<ScanMetadataRecord>>;

    /// Inserts a new record keyed by its scan id
    ///
    /// Inserting a record whose scan id already exists is not an error:
    /// scan ids are deterministic, so a repeated insert is a retried write.
    async fn insert(&self, record: &ScanMetadataRecord) -> Result<()>;
}

#[async_trait]
impl<T: MetadataStore + ?Sized> MetadataStore for Arc<T> {
    async fn latest_for(&self, key: &ScanCacheKey) -> Result<Option<ScanMetadataRecord>> {
        (**self).latest_for(key).await
    }

    async fn insert(&self, record: &ScanMetadataRecord) -> Result<()> {
        (**self).insert(record).await
    }
}
