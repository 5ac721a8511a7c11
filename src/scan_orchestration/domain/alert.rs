use super::{ScanMetadataRecord, SeveritySummary};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Minimum aggregate severity that triggers an alert.
///
/// Only these two thresholds are recognized; anything else is a
/// configuration error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertThreshold {
    Critical,
    High,
}

impl FromStr for AlertThreshold {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "CRITICAL" => Ok(AlertThreshold::Critical),
            "HIGH" => Ok(AlertThreshold::High),
            _ => Err(format!(
                "'{}' is not a recognized alert threshold. Please specify 'CRITICAL' or 'HIGH'",
                s
            )),
        }
    }
}

impl fmt::Display for AlertThreshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertThreshold::Critical => write!(f, "CRITICAL"),
            AlertThreshold::High => write!(f, "HIGH"),
        }
    }
}

/// Result of comparing a scan's severity counts with the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertDecision {
    pub fire: bool,
    pub threshold: AlertThreshold,
    /// Number of findings at or above the threshold.
    pub matching_findings: u64,
}

impl AlertDecision {
    pub fn evaluate(summary: &SeveritySummary, threshold: AlertThreshold) -> Self {
        let matching_findings = match threshold {
            AlertThreshold::Critical => summary.critical,
            AlertThreshold::High => summary.critical + summary.high,
        };
        Self {
            fire: matching_findings > 0,
            threshold,
            matching_findings,
        }
    }
}

/// Notification payload for a scan whose findings crossed the threshold.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityAlert {
    pub project_id: String,
    pub region: String,
    pub service_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision_id: Option<String>,
    pub image: String,
    pub scan_id: String,
    pub threshold: AlertThreshold,
    pub matching_findings: u64,
    pub severity_counts: SeveritySummary,
    pub result_blob_path: String,
    pub scanned_at: DateTime<Utc>,
}

impl SecurityAlert {
    pub fn from_record(record: &ScanMetadataRecord, decision: &AlertDecision) -> Self {
        Self {
            project_id: record.project_id.clone(),
            region: record.region.clone(),
            service_name: record.service_name.clone(),
            revision_id: record.revision_id.clone(),
            image: record.image.clone(),
            scan_id: record.scan_id.to_string(),
            threshold: decision.threshold,
            matching_findings: decision.matching_findings,
            severity_counts: record.severity_summary(),
            result_blob_path: record.result_blob_path.clone(),
            scanned_at: record.timestamp,
        }
    }
}
