use async_trait::async_trait;
use cloudrun_scan_trigger::prelude::*;

/// Mock MetadataStore whose reads succeed empty and whose writes fail
#[derive(Debug, Clone, Default)]
pub struct FailingMetadataStore {
    pub fail_reads: bool,
}

impl FailingMetadataStore {
    pub fn new() -> Self {
        Self { fail_reads: false }
    }

    pub fn unreachable() -> Self {
        Self { fail_reads: true }
    }
}

#[async_trait]
impl MetadataStore for FailingMetadataStore {
    async fn latest_for(&self, _key: &ScanCacheKey) -> Result<Option<ScanMetadataRecord>> {
        if self.fail_reads {
            anyhow::bail!("Mock metadata store failure: unavailable");
        }
        Ok(None)
    }

    async fn insert(&self, _record: &ScanMetadataRecord) -> Result<()> {
        anyhow::bail!("Mock metadata store failure: permission denied")
    }
}

/// Mock BlobStore that rejects every write
#[derive(Debug, Clone, Default)]
pub struct FailingBlobStore;

#[async_trait]
impl BlobStore for FailingBlobStore {
    async fn put(&self, path: &str, _content_type: &str, _body: Vec<u8>) -> Result<()> {
        anyhow::bail!("Mock blob store failure: cannot write {}", path)
    }

    async fn get(&self, _path: &str) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }
}
