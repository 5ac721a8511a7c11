use crate::application::dto::{FailureKind, ScanContext};
use crate::ports::outbound::{BlobStore, Clock, MetadataStore};
use crate::scan_orchestration::domain::{
    sortable_timestamp, ImageReference, ScanId, ScanMetadataRecord, ScanReport,
};
use crate::scan_orchestration::policies::CachePolicy;
use crate::shared::error::{PersistenceStage, ScanTriggerError};
use crate::shared::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

const JSON_CONTENT_TYPE: &str = "application/json";

/// Failure document written under `errors/` for images that did not produce a result.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FailureRecord<'a> {
    image: String,
    cache_key: &'a str,
    scan_id: &'a ScanId,
    project_id: &'a str,
    region: &'a str,
    service_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    revision_id: Option<&'a str>,
    event_id: &'a str,
    kind: FailureKind,
    error: String,
    #[serde(rename = "timestampStr", with = "sortable_timestamp")]
    timestamp: DateTime<Utc>,
}

/// PersistenceWriter - Stores the raw report and its metadata record
///
/// The blob is written first, then the metadata record that points at it.
/// There is no transaction across the two stores: a metadata failure after a
/// successful blob write leaves a stored but unindexed report, which is
/// reported as a `Persistence` error carrying the blob path.
///
/// # Type Parameters
/// * `B` - BlobStore implementation
/// * `M` - MetadataStore implementation
/// * `C` - Clock implementation
pub struct PersistenceWriter<B, M, C> {
    blobs: B,
    metadata: M,
    clock: C,
    cache_policy: CachePolicy,
}

impl<B, M, C> PersistenceWriter<B, M, C>
where
    B: BlobStore,
    M: MetadataStore,
    C: Clock,
{
    pub fn new(blobs: B, metadata: M, clock: C, cache_policy: CachePolicy) -> Self {
        Self {
            blobs,
            metadata,
            clock,
            cache_policy,
        }
    }

    /// Persists one report
    ///
    /// # Returns
    /// The metadata record that was written
    ///
    /// # Errors
    /// Returns a `Persistence` error naming the stage (blob or metadata)
    /// that failed
    pub async fn store(
        &self,
        image: &ImageReference,
        report: &ScanReport,
        context: &ScanContext,
    ) -> Result<ScanMetadataRecord> {
        let scanned_at = self.clock.now();
        let key = image.cache_key();
        let scan_id = ScanId::derive(&key, scanned_at);
        let blob_path = format!("{}/{}.json", key, scan_id);

        let persistence_error = |stage: PersistenceStage, details: String| ScanTriggerError::Persistence {
            stage,
            image: image.full_name(),
            scan_id: scan_id.to_string(),
            blob_path: blob_path.clone(),
            details,
        };

        self.blobs
            .put(&blob_path, JSON_CONTENT_TYPE, report.raw().as_bytes().to_vec())
            .await
            .map_err(|e| persistence_error(PersistenceStage::Blob, format!("{:#}", e)))?;
        tracing::info!(blob_path = %blob_path, scan_id = %scan_id, "raw report stored");

        let severity = report.severity_summary();
        let compliance = report.compliance_summary();
        let record = ScanMetadataRecord {
            project_id: context.project_id.clone(),
            region: context.region.clone(),
            service_name: context.service_name.clone(),
            revision_id: context.revision_id.clone(),
            image: image.full_name(),
            cache_key: key.as_str().to_string(),
            scan_id: scan_id.clone(),
            timestamp: scanned_at,
            vuln_critical: severity.critical,
            vuln_high: severity.high,
            vuln_medium: severity.medium,
            vuln_low: severity.low,
            vuln_total: report.findings().len() as u64,
            compliance_pass_count: compliance.passed,
            compliance_fail_count: compliance.failed,
            result_blob_path: blob_path.clone(),
            cache_expires_at: self.cache_policy.expires_at(scanned_at),
            scanner_version: report.scanner_version().map(String::from),
            event_id: Some(context.event_id.clone()),
        };

        if let Err(e) = self.metadata.insert(&record).await {
            tracing::error!(
                image = %image,
                scan_id = %scan_id,
                blob_path = %blob_path,
                error = %e,
                "metadata write failed after blob write; report is stored but not queryable"
            );
            return Err(persistence_error(PersistenceStage::Metadata, format!("{:#}", e)).into());
        }

        tracing::info!(scan_id = %scan_id, total = record.vuln_total, "scan metadata stored");
        Ok(record)
    }

    /// Writes a failure document to `errors/<cacheKey>/<scanId>.json`
    ///
    /// Best effort: a write failure is logged and otherwise ignored.
    pub async fn record_failure(
        &self,
        image: &ImageReference,
        context: &ScanContext,
        kind: FailureKind,
        error: &anyhow::Error,
    ) {
        let now = self.clock.now();
        let key = image.cache_key();
        let scan_id = ScanId::derive(&key, now);
        let path = format!("errors/{}/{}.json", key, scan_id);

        let document = FailureRecord {
            image: image.full_name(),
            cache_key: key.as_str(),
            scan_id: &scan_id,
            project_id: &context.project_id,
            region: &context.region,
            service_name: &context.service_name,
            revision_id: context.revision_id.as_deref(),
            event_id: &context.event_id,
            kind,
            error: format!("{:#}", error),
            timestamp: now,
        };

        let body = match serde_json::to_vec_pretty(&document) {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize failure record");
                return;
            }
        };

        match self.blobs.put(&path, JSON_CONTENT_TYPE, body).await {
            Ok(()) => tracing::info!(path = %path, "failure record stored"),
            Err(e) => tracing::warn!(path = %path, error = %e, "failed to store failure record"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan_orchestration::domain::{Finding, ScanCacheKey, Severity};
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Blobs {
        objects: Mutex<BTreeMap<String, Vec<u8>>>,
        fail: bool,
    }

    #[async_trait]
    impl BlobStore for Blobs {
        async fn put(&self, path: &str, _content_type: &str, body: Vec<u8>) -> Result<()> {
            if self.fail {
                anyhow::bail!("bucket not found");
            }
            self.objects.lock().unwrap().insert(path.to_string(), body);
            Ok(())
        }

        async fn get(&self, path: &str) -> Result<Option<Vec<u8>>> {
            Ok(self.objects.lock().unwrap().get(path).cloned())
        }
    }

    #[derive(Default)]
    struct Records {
        inserted: Mutex<Vec<ScanMetadataRecord>>,
        fail: bool,
    }

    #[async_trait]
    impl MetadataStore for Records {
        async fn latest_for(&self, _key: &ScanCacheKey) -> Result<Option<ScanMetadataRecord>> {
            Ok(None)
        }

        async fn insert(&self, record: &ScanMetadataRecord) -> Result<()> {
            if self.fail {
                anyhow::bail!("permission denied");
            }
            self.inserted.lock().unwrap().push(record.clone());
            Ok(())
        }
    }

    struct Fixed;

    impl Clock for Fixed {
        fn now(&self) -> DateTime<Utc> {
            Utc.with_ymd_and_hms(2026, 10, 15, 8, 0, 0).unwrap()
        }
    }

    fn finding(severity: Severity) -> Finding {
        Finding {
            id: None,
            cve: None,
            severity,
            title: None,
            package: None,
            version: None,
            fixed_version: None,
        }
    }

    fn report() -> ScanReport {
        ScanReport::new(
            r#"{"vulnerabilities":[...]}"#.to_string(),
            vec![
                finding(Severity::Critical),
                finding(Severity::High),
                finding(Severity::High),
                finding(Severity::Low),
            ],
            Vec::new(),
            Some("4.2.0".to_string()),
            None,
        )
    }

    fn context() -> ScanContext {
        ScanContext {
            project_id: "demo".to_string(),
            region: "us-central1".to_string(),
            service_name: "checkout".to_string(),
            revision_id: None,
            event_id: "evt-1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_store_writes_blob_then_record() {
        let writer = PersistenceWriter::new(
            Blobs::default(),
            Records::default(),
            Fixed,
            CachePolicy::new(24, true),
        );
        let image = ImageReference::parse("gcr.io/demo/checkout:v1").unwrap();
        let record = writer.store(&image, &report(), &context()).await.unwrap();

        assert_eq!(record.vuln_total, 4);
        assert!(record.is_consistent());
        assert_eq!(record.vuln_high, 2);
        assert_eq!(record.cache_key, image.cache_key().as_str());
        assert!(record.cache_key.starts_with("gcr.io_demo_checkout_v1-"));
        assert!(record
            .result_blob_path
            .starts_with(&format!("{}/20261015T080000000Z-", record.cache_key)));
        assert_eq!(record.event_id.as_deref(), Some("evt-1"));
        assert_eq!(
            sortable_timestamp::format(&record.cache_expires_at),
            "2026-10-16T08:00:00.000000Z"
        );

        let stored = writer.blobs.get(&record.result_blob_path).await.unwrap().unwrap();
        assert_eq!(stored, report().raw().as_bytes());
        assert_eq!(writer.metadata.inserted.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_blob_failure_writes_no_record() {
        let writer = PersistenceWriter::new(
            Blobs {
                fail: true,
                ..Blobs::default()
            },
            Records::default(),
            Fixed,
            CachePolicy::new(24, true),
        );
        let image = ImageReference::parse("nginx").unwrap();
        let err = writer.store(&image, &report(), &context()).await.unwrap_err();

        assert!(matches!(
            err.downcast_ref::<ScanTriggerError>(),
            Some(ScanTriggerError::Persistence {
                stage: PersistenceStage::Blob,
                ..
            })
        ));
        assert!(writer.metadata.inserted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_metadata_failure_reports_blob_path() {
        let writer = PersistenceWriter::new(
            Blobs::default(),
            Records {
                fail: true,
                ..Records::default()
            },
            Fixed,
            CachePolicy::new(24, true),
        );
        let image = ImageReference::parse("nginx").unwrap();
        let err = writer.store(&image, &report(), &context()).await.unwrap_err();

        match err.downcast_ref::<ScanTriggerError>() {
            Some(ScanTriggerError::Persistence {
                stage, blob_path, ..
            }) => {
                assert_eq!(*stage, PersistenceStage::Metadata);
                assert!(writer.blobs.objects.lock().unwrap().contains_key(blob_path));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_record_failure_writes_error_document() {
        let writer = PersistenceWriter::new(
            Blobs::default(),
            Records::default(),
            Fixed,
            CachePolicy::new(24, true),
        );
        let image = ImageReference::parse("gcr.io/demo/app:v1").unwrap();
        let error = anyhow::anyhow!("scan job timed out");
        writer
            .record_failure(&image, &context(), FailureKind::ScanTimedOut, &error)
            .await;

        let objects = writer.blobs.objects.lock().unwrap();
        let (path, body) = objects.iter().next().unwrap();
        assert!(path.starts_with(&format!("errors/{}/", image.cache_key())));
        let json: serde_json::Value = serde_json::from_slice(body).unwrap();
        assert_eq!(json["kind"], "scan_timed_out");
        assert_eq!(json["error"], "scan job timed out");
        assert_eq!(json["serviceName"], "checkout");
    }

    #[tokio::test]
    async fn test_record_failure_swallows_write_errors() {
        let writer = PersistenceWriter::new(
            Blobs {
                fail: true,
                ..Blobs::default()
            },
            Records::default(),
            Fixed,
            CachePolicy::new(24, true),
        );
        let image = ImageReference::parse("nginx").unwrap();
        writer
            .record_failure(&image, &context(), FailureKind::ScanFailed, &anyhow::anyhow!("x"))
            .await;
    }
}
