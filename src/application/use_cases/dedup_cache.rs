use crate::ports::outbound::{Clock, MetadataStore};
use crate::scan_orchestration::domain::{ImageReference, ScanMetadataRecord};
use crate::scan_orchestration::policies::CachePolicy;

/// Result of a cache check, with the reason for logging.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheCheck {
    /// A fresh result exists; the image is skipped.
    Fresh(Box<ScanMetadataRecord>),
    /// A result exists but is older than the TTL.
    Stale,
    /// No result exists for this image.
    Miss,
    /// The reference is not eligible for caching (mutable tag).
    Bypassed,
    /// The store could not be queried; scanning anyway.
    LookupFailed,
}

impl CacheCheck {
    pub fn should_scan(&self) -> bool {
        !matches!(self, CacheCheck::Fresh(_))
    }
}

/// DedupCache - Answers "was this image scanned recently?"
///
/// The answer is always a query against the metadata store; nothing is
/// remembered in-process between checks. Lookups fail open: when the store
/// is unavailable the image is scanned again.
///
/// # Type Parameters
/// * `M` - MetadataStore implementation
/// * `C` - Clock implementation
pub struct DedupCache<M, C> {
    store: M,
    clock: C,
    policy: CachePolicy,
}

impl<M, C> DedupCache<M, C>
where
    M: MetadataStore,
    C: Clock,
{
    pub fn new(store: M, clock: C, policy: CachePolicy) -> Self {
        Self {
            store,
            clock,
            policy,
        }
    }

    pub async fn should_scan(&self, image: &ImageReference) -> bool {
        self.check(image).await.should_scan()
    }

    pub async fn check(&self, image: &ImageReference) -> CacheCheck {
        if !self.policy.is_cacheable(image) {
            tracing::info!(image = %image, "tag reference excluded from cache, scanning");
            return CacheCheck::Bypassed;
        }

        let key = image.cache_key();
        match self.store.latest_for(&key).await {
            Ok(Some(record)) if record.image != image.full_name() => {
                tracing::warn!(
                    image = %image,
                    cache_key = %key,
                    stored_image = %record.image,
                    "cached record belongs to a different image, scanning"
                );
                CacheCheck::Miss
            }
            Ok(Some(record)) => {
                let now = self.clock.now();
                if self.policy.is_fresh(&record, now) {
                    tracing::info!(
                        image = %image,
                        scan_id = %record.scan_id,
                        age_minutes = record.age_at(now).num_minutes(),
                        "recent scan found, skipping"
                    );
                    CacheCheck::Fresh(Box::new(record))
                } else {
                    tracing::debug!(image = %image, scan_id = %record.scan_id, "cached scan expired");
                    CacheCheck::Stale
                }
            }
            Ok(None) => CacheCheck::Miss,
            Err(e) => {
                tracing::warn!(
                    image = %image,
                    cache_key = %key,
                    error = %e,
                    "cache lookup failed, scanning anyway"
                );
                CacheCheck::LookupFailed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan_orchestration::domain::{ScanCacheKey, ScanId};
    use crate::shared::Result;
    use async_trait::async_trait;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use std::sync::Mutex;

    struct StubStore {
        latest: Mutex<Option<ScanMetadataRecord>>,
        fail: bool,
    }

    #[async_trait]
    impl MetadataStore for StubStore {
        async fn latest_for(&self, _key: &ScanCacheKey) -> Result<Option<ScanMetadataRecord>> {
            if self.fail {
                anyhow::bail!("firestore unavailable");
            }
            Ok(self.latest.lock().unwrap().clone())
        }

        async fn insert(&self, _record: &ScanMetadataRecord) -> Result<()> {
            Ok(())
        }
    }

    struct Fixed(DateTime<Utc>);

    impl Clock for Fixed {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 15, 12, 0, 0).unwrap()
    }

    fn record_at(image: &ImageReference, timestamp: DateTime<Utc>) -> ScanMetadataRecord {
        let key = image.cache_key();
        ScanMetadataRecord {
            project_id: "p".to_string(),
            region: "r".to_string(),
            service_name: "s".to_string(),
            revision_id: None,
            image: image.full_name(),
            cache_key: key.as_str().to_string(),
            scan_id: ScanId::derive(&key, timestamp),
            timestamp,
            vuln_critical: 0,
            vuln_high: 0,
            vuln_medium: 0,
            vuln_low: 0,
            vuln_total: 0,
            compliance_pass_count: 0,
            compliance_fail_count: 0,
            result_blob_path: String::new(),
            cache_expires_at: timestamp + Duration::hours(24),
            scanner_version: None,
            event_id: None,
        }
    }

    fn cache(latest: Option<ScanMetadataRecord>, fail: bool, tags: bool) -> DedupCache<StubStore, Fixed> {
        DedupCache::new(
            StubStore {
                latest: Mutex::new(latest),
                fail,
            },
            Fixed(now()),
            CachePolicy::new(24, tags),
        )
    }

    #[tokio::test]
    async fn test_recent_record_skips_scan() {
        let image = ImageReference::parse("gcr.io/p/app:v1").unwrap();
        let cache = cache(Some(record_at(&image, now() - Duration::hours(23))), false, true);
        assert!(!cache.should_scan(&image).await);
    }

    #[tokio::test]
    async fn test_expired_record_scans() {
        let image = ImageReference::parse("gcr.io/p/app:v1").unwrap();
        let cache = cache(Some(record_at(&image, now() - Duration::hours(25))), false, true);
        assert_eq!(cache.check(&image).await, CacheCheck::Stale);
        assert!(cache.should_scan(&image).await);
    }

    #[tokio::test]
    async fn test_missing_record_scans() {
        let image = ImageReference::parse("gcr.io/p/app:v1").unwrap();
        let cache = cache(None, false, true);
        assert_eq!(cache.check(&image).await, CacheCheck::Miss);
    }

    #[tokio::test]
    async fn test_lookup_error_fails_open() {
        let image = ImageReference::parse("gcr.io/p/app:v1").unwrap();
        let cache = cache(None, true, true);
        assert_eq!(cache.check(&image).await, CacheCheck::LookupFailed);
        assert!(cache.should_scan(&image).await);
    }

    #[tokio::test]
    async fn test_record_for_another_image_is_not_a_hit() {
        let scanned = ImageReference::parse("gcr.io/team/my_app:v1").unwrap();
        let unscanned = ImageReference::parse("gcr.io/team_my/app:v1").unwrap();
        let mut record = record_at(&scanned, now() - Duration::hours(1));
        record.cache_key = unscanned.cache_key().as_str().to_string();
        let cache = cache(Some(record), false, true);

        assert_eq!(cache.check(&unscanned).await, CacheCheck::Miss);
        assert!(cache.should_scan(&unscanned).await);
    }

    #[tokio::test]
    async fn test_tag_reference_bypasses_cache_when_disabled() {
        let image = ImageReference::parse("gcr.io/p/app:v1").unwrap();
        let cache = cache(Some(record_at(&image, now())), false, false);
        assert_eq!(cache.check(&image).await, CacheCheck::Bypassed);
    }
}
