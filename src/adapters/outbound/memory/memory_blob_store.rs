use crate::ports::outbound::BlobStore;
use crate::shared::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

/// InMemoryBlobStore keeps objects in a concurrent map keyed by path.
#[derive(Clone, Default)]
pub struct InMemoryBlobStore {
    objects: Arc<DashMap<String, Vec<u8>>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored paths in lexical order
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<_> = self.objects.iter().map(|entry| entry.key().clone()).collect();
        paths.sort();
        paths
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn put(&self, path: &str, _content_type: &str, body: Vec<u8>) -> Result<()> {
        self.objects.insert(path.to_string(), body);
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.objects.get(path).map(|entry| entry.value().clone()))
    }
}
