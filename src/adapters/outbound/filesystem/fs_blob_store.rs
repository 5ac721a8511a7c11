use super::atomic_write::{write_atomically, WriteMode};
use crate::ports::outbound::BlobStore;
use crate::scan_orchestration::services::MAX_SCANNER_OUTPUT_BYTES;
use crate::shared::security::{read_regular_file, resolve_within};
use crate::shared::Result;
use async_trait::async_trait;
use std::path::PathBuf;

/// FileSystemBlobStore stores blobs as files below a root directory.
///
/// Blob paths map one-to-one onto relative file paths. Content type is not
/// recorded; reports are always JSON.
#[derive(Debug, Clone)]
pub struct FileSystemBlobStore {
    root: PathBuf,
}

impl FileSystemBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &std::path::Path {
        &self.root
    }
}

#[async_trait]
impl BlobStore for FileSystemBlobStore {
    async fn put(&self, path: &str, _content_type: &str, body: Vec<u8>) -> Result<()> {
        let target = resolve_within(&self.root, path)?;
        write_atomically(target, body, WriteMode::Replace).await?;
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Option<Vec<u8>>> {
        let target = resolve_within(&self.root, path)?;
        tokio::task::spawn_blocking(move || {
            read_regular_file(&target, MAX_SCANNER_OUTPUT_BYTES as u64)
        })
        .await?
    }
}
