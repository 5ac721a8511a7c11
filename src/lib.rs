//! cloudrun-scan-trigger - container image scanning for Cloud Run deployments
//!
//! This library turns Cloud Run deployment audit events into vulnerability
//! scans: every distinct container image of a deployment is scanned by an
//! ephemeral qscanner job, the report is stored, indexed for deduplication,
//! and checked against an alert threshold. It follows hexagonal architecture
//! and Domain-Driven Design principles.
//!
//! # Architecture
//!
//! The library is organized into the following layers:
//!
//! - **Domain Layer** (`scan_orchestration`): Event, image, report and alert models,
//!   plus the pure decoding, parsing and evaluation services
//! - **Application Layer** (`application`): The event pipeline and its stages
//! - **Ports** (`ports`): Interface definitions for infrastructure
//! - **Adapters** (`adapters`): Google Cloud, filesystem, subprocess and in-memory
//!   implementations of the ports, plus the Pub/Sub push endpoint
//! - **Configuration** (`config`): YAML file and environment resolution
//! - **Shared** (`shared`): Error types, logging, and path safety helpers
//!
//! # Example
//!
//! ```no_run
//! use cloudrun_scan_trigger::prelude::*;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example(raw: &[u8]) -> Result<()> {
//! let config = ScanConfig::resolve(ConfigFile::default(), |name| std::env::var(name).ok())?;
//! let pipeline = AdapterFactory::build_pipeline(&config).await?;
//!
//! let summary = pipeline.execute(raw, CancellationToken::new()).await?;
//! println!("{}", serde_json::to_string_pretty(&summary)?);
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod application;
pub mod config;
pub mod ports;
pub mod scan_orchestration;
pub mod shared;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::adapters::inbound::{push_router, serve_push_endpoint};
    pub use crate::adapters::outbound::clock::{FixedClock, SystemClock};
    pub use crate::adapters::outbound::console::LogNotifier;
    pub use crate::adapters::outbound::filesystem::{FileSystemBlobStore, FileSystemMetadataStore};
    pub use crate::adapters::outbound::gcp::{
        CloudRunJobRunner, CloudRunJobsConfig, FirestoreMetadataStore, GcsBlobStore,
        GoogleApiClient, PubSubNotifier,
    };
    pub use crate::adapters::outbound::memory::{InMemoryBlobStore, InMemoryMetadataStore};
    pub use crate::adapters::outbound::process::LocalScannerRunner;
    pub use crate::application::dto::{
        EventState, EventSummary, FailureKind, ImageOutcome, ImageStage, PipelineSettings,
    };
    pub use crate::application::factories::AdapterFactory;
    pub use crate::application::use_cases::{PipelinePorts, ProcessDeploymentEventUseCase};
    pub use crate::config::{Backend, ConfigFile, ScanConfig};
    pub use crate::ports::inbound::DeploymentEventPort;
    pub use crate::ports::outbound::{AlertNotifier, BlobStore, Clock, JobRunner, MetadataStore};
    pub use crate::scan_orchestration::domain::{
        AlertThreshold, DeploymentEvent, ImageReference, ScanCacheKey, ScanMetadataRecord,
        ScanReport, SecurityAlert, Severity, SeveritySummary,
    };
    pub use crate::scan_orchestration::services::{AlertEvaluator, EventDecoder, ReportParser};
    pub use crate::shared::error::{ExitCode, ScanTriggerError};
    pub use crate::shared::Result;
}
