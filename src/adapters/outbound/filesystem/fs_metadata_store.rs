use super::atomic_write::{write_atomically, WriteMode};
use crate::ports::outbound::MetadataStore;
use crate::scan_orchestration::domain::{ScanCacheKey, ScanMetadataRecord};
use crate::shared::security::{read_regular_file, resolve_within};
use crate::shared::Result;
use anyhow::Context;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Largest metadata document read back
const MAX_RECORD_BYTES: u64 = 64 * 1024;

/// FileSystemMetadataStore keeps one JSON document per scan.
///
/// Layout: `<root>/<cacheKey>/<scanId>.json`. Records are never rewritten:
/// inserting an existing scan id leaves the first document in place.
#[derive(Debug, Clone)]
pub struct FileSystemMetadataStore {
    root: PathBuf,
}

impl FileSystemMetadataStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn read_records(dir: &Path) -> Result<Vec<ScanMetadataRecord>> {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(anyhow::Error::new(e)
                    .context(format!("Failed to list {}", dir.display())))
            }
        };

        let mut records = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let parsed = read_regular_file(&path, MAX_RECORD_BYTES).and_then(|content| {
                let content = content.with_context(|| format!("{} disappeared", path.display()))?;
                serde_json::from_slice::<ScanMetadataRecord>(&content)
                    .with_context(|| format!("Failed to parse {}", path.display()))
            });
            match parsed {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "skipping unreadable metadata record"),
            }
        }
        Ok(records)
    }
}

#[async_trait]
impl MetadataStore for FileSystemMetadataStore {
    async fn latest_for(&self, cache_key: &ScanCacheKey) -> Result<Option<ScanMetadataRecord>> {
        let dir = resolve_within(&self.root, cache_key.as_str())?;
        let records = tokio::task::spawn_blocking(move || Self::read_records(&dir)).await??;
        Ok(records
            .into_iter()
            .filter(|r| r.cache_key == cache_key.as_str())
            .max_by(|a, b| (a.timestamp, &a.scan_id).cmp(&(b.timestamp, &b.scan_id))))
    }

    async fn insert(&self, record: &ScanMetadataRecord) -> Result<()> {
        let target = resolve_within(
            &self.root,
            &format!("{}/{}.json", record.cache_key, record.scan_id),
        )?;
        let content = serde_json::to_vec_pretty(record)?;
        if !write_atomically(target, content, WriteMode::KeepExisting).await? {
            tracing::debug!(scan_id = %record.scan_id, "metadata record already exists");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan_orchestration::domain::ScanId;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use tempfile::TempDir;

    fn record(key: &str, timestamp: DateTime<Utc>, high: u64) -> ScanMetadataRecord {
        let cache_key = ScanCacheKey::from_stored(key);
        ScanMetadataRecord {
            project_id: "demo".to_string(),
            region: "us-central1".to_string(),
            service_name: "checkout".to_string(),
            revision_id: None,
            image: "gcr.io/demo/app:v1".to_string(),
            cache_key: key.to_string(),
            scan_id: ScanId::derive(&cache_key, timestamp),
            timestamp,
            vuln_critical: 0,
            vuln_high: high,
            vuln_medium: 0,
            vuln_low: 0,
            vuln_total: high,
            compliance_pass_count: 0,
            compliance_fail_count: 0,
            result_blob_path: format!("{}/x.json", key),
            cache_expires_at: timestamp + Duration::hours(24),
            scanner_version: None,
            event_id: Some("evt-1".to_string()),
        }
    }

    #[tokio::test]
    async fn test_latest_for_returns_newest_record() {
        let dir = TempDir::new().unwrap();
        let store = FileSystemMetadataStore::new(dir.path());
        let t0 = Utc.with_ymd_and_hms(2026, 10, 14, 8, 0, 0).unwrap();

        store.insert(&record("gcr.io_demo_app_v1", t0, 1)).await.unwrap();
        store
            .insert(&record("gcr.io_demo_app_v1", t0 + Duration::hours(3), 5))
            .await
            .unwrap();
        store.insert(&record("other", t0 + Duration::hours(9), 0)).await.unwrap();

        let latest = store
            .latest_for(&ScanCacheKey::from_stored("gcr.io_demo_app_v1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.vuln_high, 5);
        assert!(dir.path().join("gcr.io_demo_app_v1").is_dir());
    }

    #[tokio::test]
    async fn test_insert_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = FileSystemMetadataStore::new(dir.path());
        let ts = Utc.with_ymd_and_hms(2026, 10, 15, 9, 0, 0).unwrap();
        let first = record("k", ts, 1);
        let mut second = first.clone();
        second.vuln_high = 99;

        store.insert(&first).await.unwrap();
        store.insert(&second).await.unwrap();

        let latest = store.latest_for(&first.cache_key()).await.unwrap().unwrap();
        assert_eq!(latest, first);
        assert_eq!(std::fs::read_dir(dir.path().join("k")).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_unknown_key_is_none_and_corrupt_files_are_skipped() {
        let dir = TempDir::new().unwrap();
        let store = FileSystemMetadataStore::new(dir.path());
        assert!(store
            .latest_for(&ScanCacheKey::from_stored("missing"))
            .await
            .unwrap()
            .is_none());

        std::fs::create_dir_all(dir.path().join("k")).unwrap();
        std::fs::write(dir.path().join("k/broken.json"), "{not json").unwrap();
        let ts = Utc.with_ymd_and_hms(2026, 10, 15, 9, 0, 0).unwrap();
        store.insert(&record("k", ts, 2)).await.unwrap();

        let latest = store
            .latest_for(&ScanCacheKey::from_stored("k"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.vuln_high, 2);
    }
}
