/// Data Transfer Objects for application layer
///
/// DTOs are used to transfer data between the application layer
/// and adapters, keeping the domain layer isolated.
mod event_summary;
mod pipeline_settings;
mod scan_context;

pub use event_summary::{EventState, EventSummary, FailureKind, ImageOutcome, ImageStage};
pub use pipeline_settings::PipelineSettings;
pub use scan_context::ScanContext;
