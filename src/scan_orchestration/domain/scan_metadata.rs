use super::{ScanCacheKey, SeveritySummary};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier of one completed scan.
///
/// `<yyyymmddTHHMMSSmmmZ>-<8 hex>`: the timestamp prefix keeps per-image
/// results chronologically listable, the suffix is derived from the cache key
/// so two images finishing in the same millisecond get distinct ids and a
/// retried invocation reproduces the same id for the same instant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScanId(String);

impl ScanId {
    pub fn derive(cache_key: &ScanCacheKey, scanned_at: DateTime<Utc>) -> Self {
        let digest = Uuid::new_v5(&Uuid::NAMESPACE_URL, cache_key.as_str().as_bytes());
        let suffix: String = digest.simple().to_string().chars().take(8).collect();
        Self(format!(
            "{}-{}",
            scanned_at.format("%Y%m%dT%H%M%S%3fZ"),
            suffix
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Fixed-width UTC timestamps so that string order equals time order.
pub mod sortable_timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

    pub fn format(value: &DateTime<Utc>) -> String {
        value.format(FORMAT).to_string()
    }

    pub fn parse(value: &str) -> Result<DateTime<Utc>, String> {
        NaiveDateTime::parse_from_str(value, FORMAT)
            .map(|naive| naive.and_utc())
            .or_else(|_| DateTime::parse_from_rfc3339(value).map(|dt| dt.with_timezone(&Utc)))
            .map_err(|e| format!("invalid timestamp '{}': {}", value, e))
    }

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Normalized, queryable summary of one completed scan.
///
/// Append-only: a record is never modified after it is written. The newest
/// record per `cache_key` is what the dedup cache consults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanMetadataRecord {
    pub project_id: String,
    pub region: String,
    pub service_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision_id: Option<String>,
    pub image: String,
    pub cache_key: String,
    pub scan_id: ScanId,
    #[serde(rename = "timestampStr", with = "sortable_timestamp")]
    pub timestamp: DateTime<Utc>,
    pub vuln_critical: u64,
    pub vuln_high: u64,
    pub vuln_medium: u64,
    pub vuln_low: u64,
    pub vuln_total: u64,
    pub compliance_pass_count: u64,
    pub compliance_fail_count: u64,
    pub result_blob_path: String,
    #[serde(with = "sortable_timestamp")]
    pub cache_expires_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scanner_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
}

impl ScanMetadataRecord {
    pub fn severity_summary(&self) -> SeveritySummary {
        SeveritySummary {
            critical: self.vuln_critical,
            high: self.vuln_high,
            medium: self.vuln_medium,
            low: self.vuln_low,
        }
    }

    pub fn cache_key(&self) -> ScanCacheKey {
        ScanCacheKey::from_stored(self.cache_key.clone())
    }

    /// Age of the record relative to `now`.
    pub fn age_at(&self, now: DateTime<Utc>) -> Duration {
        now - self.timestamp
    }

    /// Checks the per-severity counts against the total.
    pub fn is_consistent(&self) -> bool {
        self.severity_summary().total() == self.vuln_total
    }
}
