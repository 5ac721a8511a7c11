use crate::scan_orchestration::domain::{
    AlertDecision, AlertThreshold, ScanMetadataRecord, SecurityAlert,
};

/// Decides whether a persisted scan warrants a security alert.
#[derive(Debug, Clone, Copy)]
pub struct AlertEvaluator {
    threshold: AlertThreshold,
}

impl AlertEvaluator {
    pub fn new(threshold: AlertThreshold) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> AlertThreshold {
        self.threshold
    }

    pub fn evaluate(&self, record: &ScanMetadataRecord) -> AlertDecision {
        AlertDecision::evaluate(&record.severity_summary(), self.threshold)
    }

    /// Builds the alert payload when the decision fires.
    pub fn alert_for(&self, record: &ScanMetadataRecord) -> Option<SecurityAlert> {
        let decision = self.evaluate(record);
        decision
            .fire
            .then(|| SecurityAlert::from_record(record, &decision))
    }
}
