/// Mock implementations for testing
mod mock_alert_notifier;
mod mock_job_runner;
mod mock_stores;

pub use mock_alert_notifier::RecordingNotifier;
pub use mock_job_runner::{JobScript, ScriptedJobRunner};
pub use mock_stores::{FailingBlobStore, FailingMetadataStore};
