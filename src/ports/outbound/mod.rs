/// Outbound ports (Driven ports) - Infrastructure interfaces
///
/// These ports define the interfaces that the application core uses
/// to interact with external systems (job platform, storage, messaging, time).
pub mod alert_notifier;
pub mod blob_store;
pub mod clock;
pub mod job_runner;
pub mod metadata_store;

pub use alert_notifier::AlertNotifier;
pub use blob_store::BlobStore;
pub use clock::Clock;
pub use job_runner::JobRunner;
pub use metadata_store::MetadataStore;
