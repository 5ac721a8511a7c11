use crate::ports::outbound::MetadataStore;
use crate::scan_orchestration::domain::{ScanCacheKey, ScanId, ScanMetadataRecord};
use crate::shared::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

/// InMemoryMetadataStore keeps records in a concurrent map keyed by scan id.
///
/// Clones share the same map, so a test can keep one handle for assertions
/// while the pipeline writes through another.
#[derive(Clone, Default)]
pub struct InMemoryMetadataStore {
    records: Arc<DashMap<ScanId, ScanMetadataRecord>>,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All records, oldest first
    pub fn records(&self) -> Vec<ScanMetadataRecord> {
        let mut records: Vec<_> = self.records.iter().map(|entry| entry.value().clone()).collect();
        records.sort_by(|a, b| (a.timestamp, &a.scan_id).cmp(&(b.timestamp, &b.scan_id)));
        records
    }
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn latest_for(&self, key: &ScanCacheKey) -> Result<Option<ScanMetadataRecord>> {
        Ok(self
            .records
            .iter()
            .filter(|entry| entry.value().cache_key == key.as_str())
            .max_by(|a, b| {
                (a.value().timestamp, a.key()).cmp(&(b.value().timestamp, b.key()))
            })
            .map(|entry| entry.value().clone()))
    }

    async fn insert(&self, record: &ScanMetadataRecord) -> Result<()> {
        self.records
            .entry(record.scan_id.clone())
            .or_insert_with(|| record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn record(key: &str, timestamp: DateTime<Utc>, critical: u64) -> ScanMetadataRecord {
        let cache_key = ScanCacheKey::from_stored(key);
        ScanMetadataRecord {
            project_id: "p".to_string(),
            region: "r".to_string(),
            service_name: "s".to_string(),
            revision_id: None,
            image: key.to_string(),
            cache_key: key.to_string(),
            scan_id: ScanId::derive(&cache_key, timestamp),
            timestamp,
            vuln_critical: critical,
            vuln_high: 0,
            vuln_medium: 0,
            vuln_low: 0,
            vuln_total: critical,
            compliance_pass_count: 0,
            compliance_fail_count: 0,
            result_blob_path: String::new(),
            cache_expires_at: timestamp + Duration::hours(24),
            scanner_version: None,
            event_id: None,
        }
    }

    #[tokio::test]
    async fn test_latest_for_picks_newest_record_of_key() {
        let store = InMemoryMetadataStore::new();
        let base = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        store.insert(&record("a", base, 1)).await.unwrap();
        store.insert(&record("a", base + Duration::hours(2), 2)).await.unwrap();
        store.insert(&record("b", base + Duration::hours(5), 3)).await.unwrap();

        let latest = store
            .latest_for(&ScanCacheKey::from_stored("a"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.vuln_critical, 2);
        assert!(store
            .latest_for(&ScanCacheKey::from_stored("c"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_insert_is_idempotent_per_scan_id() {
        let store = InMemoryMetadataStore::new();
        let at = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        store.insert(&record("a", at, 1)).await.unwrap();
        store.insert(&record("a", at, 9)).await.unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.records()[0].vuln_critical, 1);
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let store = InMemoryMetadataStore::new();
        let handle = store.clone();
        store.insert(&record("a", Utc::now(), 0)).await.unwrap();
        assert_eq!(handle.len(), 1);
    }
}
