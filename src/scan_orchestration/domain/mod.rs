pub mod alert;
pub mod deployment_event;
pub mod image_reference;
pub mod scan_job;
pub mod scan_metadata;
pub mod scan_report;

pub use alert::{AlertDecision, AlertThreshold, SecurityAlert};
pub use deployment_event::{DeploymentEvent, DeploymentMethod};
pub use image_reference::{sanitize_path_segment, ImageReference, ScanCacheKey};
pub use scan_job::{
    AccessTokenSource, JobHandle, JobOutcome, JobState, JobStatus, OutputLocation, ScanJobSpec,
    TimeoutReason, SCANNER_TOKEN_ENV,
};
pub use scan_metadata::{sortable_timestamp, ScanId, ScanMetadataRecord};
pub use scan_report::{
    ComplianceCheck, ComplianceStatus, ComplianceSummary, Finding, ScanReport, Severity,
    SeveritySummary,
};
