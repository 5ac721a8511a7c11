use std::fmt;
use thiserror::Error;

/// Exit codes for the CLI application.
///
/// These codes let the invoking platform distinguish between failures that
/// are worth retrying and failures that will never succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// The event reached `Completed` (including recorded per-image failures)
    Success = 0,
    /// Invalid command-line arguments (clap parsing errors)
    InvalidArguments = 2,
    /// The configuration could not be loaded or validated
    ConfigurationError = 3,
    /// The event envelope was malformed; retrying will not help
    MalformedEvent = 4,
    /// The invocation aborted before completing; eligible for transport retry
    InvocationAborted = 5,
}

impl ExitCode {
    /// Convert to i32 for use with std::process::exit
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Classifies an error returned from the pipeline into an exit code.
    pub fn for_error(error: &anyhow::Error) -> Self {
        match error.downcast_ref::<ScanTriggerError>() {
            Some(ScanTriggerError::Configuration { .. }) => ExitCode::ConfigurationError,
            Some(ScanTriggerError::MalformedEvent { .. }) => ExitCode::MalformedEvent,
            _ => ExitCode::InvocationAborted,
        }
    }
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitCode::Success => write!(f, "Success (0)"),
            ExitCode::InvalidArguments => write!(f, "Invalid Arguments (2)"),
            ExitCode::ConfigurationError => write!(f, "Configuration Error (3)"),
            ExitCode::MalformedEvent => write!(f, "Malformed Event (4)"),
            ExitCode::InvocationAborted => write!(f, "Invocation Aborted (5)"),
        }
    }
}

/// Which persistence step failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistenceStage {
    Blob,
    Metadata,
}

impl fmt::Display for PersistenceStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistenceStage::Blob => write!(f, "blob"),
            PersistenceStage::Metadata => write!(f, "metadata"),
        }
    }
}

/// Classified failures of the scan pipeline.
///
/// Uses thiserror to derive Display and Error; adapters and use cases wrap
/// these in `anyhow::Error` and callers classify with `downcast_ref`.
#[derive(Debug, Error)]
pub enum ScanTriggerError {
    #[error("Malformed deployment event: {reason}\n\n💡 Hint: The event is dropped and will not be retried")]
    MalformedEvent { reason: String },

    #[error("Invalid configuration for '{field}': {reason}\n\n💡 Hint: {hint}")]
    Configuration {
        field: String,
        reason: String,
        hint: String,
    },

    #[error("Failed to parse scanner report for {image}\nDetails: {details}")]
    ReportParse { image: String, details: String },

    #[error("Failed to persist {stage} for {image} (scan {scan_id}, blob {blob_path})\nDetails: {details}\n\n💡 Hint: The raw report can be recovered from the blob path and re-indexed manually")]
    Persistence {
        stage: PersistenceStage,
        image: String,
        scan_id: String,
        blob_path: String,
        details: String,
    },

    #[error("Scan job {job} failed for {image}: {details}")]
    ScanFailed {
        image: String,
        job: String,
        details: String,
    },

    #[error("Scan job {job} for {image} timed out after {elapsed_secs}s")]
    ScanTimedOut {
        image: String,
        job: String,
        elapsed_secs: u64,
    },
}

impl ScanTriggerError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        ScanTriggerError::MalformedEvent {
            reason: reason.into(),
        }
    }

    pub fn configuration(
        field: impl Into<String>,
        reason: impl Into<String>,
        hint: impl Into<String>,
    ) -> Self {
        ScanTriggerError::Configuration {
            field: field.into(),
            reason: reason.into(),
            hint: hint.into(),
        }
    }
}
