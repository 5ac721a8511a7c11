use crate::scan_orchestration::domain::DeploymentEvent;

/// ScanContext - Deployment facts that travel with every image of an event
///
/// Copied out of the [`DeploymentEvent`] once so that per-image pipelines do
/// not need to borrow the event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanContext {
    pub project_id: String,
    pub region: String,
    pub service_name: String,
    pub revision_id: Option<String>,
    pub event_id: String,
}

impl ScanContext {
    pub fn from_event(event: &DeploymentEvent) -> Self {
        Self {
            project_id: event.project_id().to_string(),
            region: event.region().to_string(),
            service_name: event.service_name().to_string(),
            revision_id: event.revision_id().map(String::from),
            event_id: event.event_id().to_string(),
        }
    }
}
