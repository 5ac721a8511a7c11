use crate::scan_orchestration::domain::{ImageReference, ScanMetadataRecord};
use chrono::{DateTime, Duration, Utc};

/// CachePolicy decides whether a previous scan result is still fresh
///
/// Freshness is a pure age check against the record's timestamp:
/// a record is fresh while `now - record.timestamp < ttl`.
/// Tag-only references may be excluded from caching because the tag can be
/// moved to a different image between deployments.
#[derive(Debug, Clone, Copy)]
pub struct CachePolicy {
    ttl: Duration,
    cache_tag_references: bool,
}

impl CachePolicy {
    pub fn new(cache_hours: u32, cache_tag_references: bool) -> Self {
        Self {
            ttl: Duration::hours(i64::from(cache_hours)),
            cache_tag_references,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns true if results for this reference may be reused at all
    pub fn is_cacheable(&self, image: &ImageReference) -> bool {
        image.is_pinned() || self.cache_tag_references
    }

    pub fn is_fresh(&self, record: &ScanMetadataRecord, now: DateTime<Utc>) -> bool {
        record.age_at(now) < self.ttl
    }

    /// Expiry stamped on a record written at `scanned_at`
    pub fn expires_at(&self, scanned_at: DateTime<Utc>) -> DateTime<Utc> {
        scanned_at + self.ttl
    }
}
