use crate::scan_orchestration::domain::{AccessTokenSource, AlertThreshold};
use std::time::Duration;

/// PipelineSettings - Validated runtime settings consumed by the use cases
///
/// Built once from the resolved configuration; the use cases never read
/// the environment themselves.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub scanner_image: String,
    pub pod_endpoint: String,
    pub access_token: AccessTokenSource,
    pub job_service_account: Option<String>,
    pub scan_timeout: Duration,
    pub poll_interval: Duration,
    pub cache_hours: u32,
    pub cache_tag_references: bool,
    pub alert_threshold: AlertThreshold,
    pub max_concurrent_scans: usize,
    pub invocation_timeout: Duration,
    pub cleanup_reserve: Duration,
}

impl PipelineSettings {
    /// Time budget for waiting on jobs within one invocation
    pub fn wait_budget(&self) -> Duration {
        self.invocation_timeout.saturating_sub(self.cleanup_reserve)
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            scanner_image: "qualys/qscanner:latest".to_string(),
            pod_endpoint: String::new(),
            access_token: AccessTokenSource::Environment {
                variable: "QUALYS_ACCESS_TOKEN".to_string(),
            },
            job_service_account: None,
            scan_timeout: Duration::from_secs(1800),
            poll_interval: Duration::from_secs(10),
            cache_hours: 24,
            cache_tag_references: true,
            alert_threshold: AlertThreshold::High,
            max_concurrent_scans: 2,
            invocation_timeout: Duration::from_secs(3600),
            cleanup_reserve: Duration::from_secs(60),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wait_budget_subtracts_reserve() {
        let settings = PipelineSettings::default();
        assert_eq!(settings.wait_budget(), Duration::from_secs(3540));
    }

    #[test]
    fn test_wait_budget_saturates() {
        let settings = PipelineSettings {
            invocation_timeout: Duration::from_secs(30),
            cleanup_reserve: Duration::from_secs(60),
            ..PipelineSettings::default()
        };
        assert_eq!(settings.wait_budget(), Duration::ZERO);
    }
}
