use crate::ports::outbound::AlertNotifier;
use crate::scan_orchestration::domain::SecurityAlert;
use crate::shared::Result;
use async_trait::async_trait;

/// LogNotifier adapter for reporting security alerts as structured log lines
///
/// Always configured. The `SECURITY ALERT` warning carries every field a
/// log-based alerting policy needs to match on.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AlertNotifier for LogNotifier {
    async fn notify(&self, alert: &SecurityAlert) -> Result<()> {
        tracing::warn!(
            alert = "SECURITY ALERT",
            project_id = %alert.project_id,
            region = %alert.region,
            service = %alert.service_name,
            revision = alert.revision_id.as_deref().unwrap_or(""),
            image = %alert.image,
            scan_id = %alert.scan_id,
            threshold = %alert.threshold,
            matching_findings = alert.matching_findings,
            critical = alert.severity_counts.critical,
            high = alert.severity_counts.high,
            medium = alert.severity_counts.medium,
            low = alert.severity_counts.low,
            result_blob_path = %alert.result_blob_path,
            "SECURITY ALERT: {} finding(s) at or above {} in {}",
            alert.matching_findings,
            alert.threshold,
            alert.image
        );
        Ok(())
    }
}
