use crate::scan_orchestration::domain::{ScanId, SeveritySummary};
use serde::Serialize;
use std::fmt;

/// Lifecycle of one event through the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventState {
    Received,
    Decoded,
    Completed,
}

impl fmt::Display for EventState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventState::Received => "received",
            EventState::Decoded => "decoded",
            EventState::Completed => "completed",
        };
        write!(f, "{}", name)
    }
}

/// Step of the per-image pipeline. Used for logging and to classify failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageStage {
    CacheChecked,
    Dispatched,
    Collected,
    Persisted,
    Alerted,
}

impl fmt::Display for ImageStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ImageStage::CacheChecked => "cache_checked",
            ImageStage::Dispatched => "dispatched",
            ImageStage::Collected => "collected",
            ImageStage::Persisted => "persisted",
            ImageStage::Alerted => "alerted",
        };
        write!(f, "{}", name)
    }
}

/// Why an image ended in the Failed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The job could not be created or started
    DispatchFailed,
    ScanFailed,
    ScanTimedOut,
    ReportParse,
    Persistence,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::DispatchFailed => "dispatch_failed",
            FailureKind::ScanFailed => "scan_failed",
            FailureKind::ScanTimedOut => "scan_timed_out",
            FailureKind::ReportParse => "report_parse",
            FailureKind::Persistence => "persistence",
        };
        write!(f, "{}", name)
    }
}

/// Terminal result for one image of an event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ImageOutcome {
    /// A fresh result already exists (or the cache check said so).
    Skipped {
        image: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        previous_scan_id: Option<ScanId>,
    },
    /// Scanned and persisted; `alerted` is true when a notification fired.
    Persisted {
        image: String,
        scan_id: ScanId,
        result_blob_path: String,
        severity: SeveritySummary,
        alerted: bool,
    },
    Failed {
        image: String,
        kind: FailureKind,
        error: String,
    },
}

impl ImageOutcome {
    pub fn image(&self) -> &str {
        match self {
            ImageOutcome::Skipped { image, .. }
            | ImageOutcome::Persisted { image, .. }
            | ImageOutcome::Failed { image, .. } => image,
        }
    }
}

/// EventSummary - Response DTO of the event-processing use case
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventSummary {
    pub event_id: String,
    pub service_name: String,
    pub state: EventState,
    pub outcomes: Vec<ImageOutcome>,
}

impl EventSummary {
    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, ImageOutcome::Skipped { .. }))
    }

    pub fn persisted(&self) -> usize {
        self.count(|o| matches!(o, ImageOutcome::Persisted { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, ImageOutcome::Failed { .. }))
    }

    pub fn alerted(&self) -> usize {
        self.count(|o| matches!(o, ImageOutcome::Persisted { alerted: true, .. }))
    }

    fn count(&self, predicate: impl Fn(&ImageOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|o| predicate(o)).count()
    }
}
