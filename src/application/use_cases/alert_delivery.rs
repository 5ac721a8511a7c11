use crate::ports::outbound::AlertNotifier;
use crate::scan_orchestration::domain::{AlertDecision, ScanMetadataRecord};
use crate::scan_orchestration::services::AlertEvaluator;

/// AlertDelivery - Evaluates a persisted record and fans the alert out
///
/// Every configured notifier is tried; a failing notifier is logged and
/// does not stop the others.
pub struct AlertDelivery<N> {
    evaluator: AlertEvaluator,
    notifiers: Vec<N>,
}

impl<N> AlertDelivery<N>
where
    N: AlertNotifier,
{
    pub fn new(evaluator: AlertEvaluator, notifiers: Vec<N>) -> Self {
        Self {
            evaluator,
            notifiers,
        }
    }

    /// Returns the decision; `decision.fire` tells whether notifiers were called
    pub async fn evaluate_and_notify(&self, record: &ScanMetadataRecord) -> AlertDecision {
        let decision = self.evaluator.evaluate(record);
        let Some(alert) = self.evaluator.alert_for(record) else {
            tracing::debug!(
                scan_id = %record.scan_id,
                threshold = %decision.threshold,
                "findings below alert threshold"
            );
            return decision;
        };

        for notifier in &self.notifiers {
            if let Err(e) = notifier.notify(&alert).await {
                tracing::warn!(scan_id = %record.scan_id, error = %e, "alert notification failed");
            }
        }
        decision
    }
}
