use crate::adapters::outbound::clock::SystemClock;
use crate::adapters::outbound::console::LogNotifier;
use crate::adapters::outbound::filesystem::{FileSystemBlobStore, FileSystemMetadataStore};
use crate::adapters::outbound::gcp::{
    CloudRunJobRunner, CloudRunJobsConfig, FirestoreMetadataStore, GcsBlobStore, GoogleApiClient,
    PubSubNotifier,
};
use crate::adapters::outbound::process::LocalScannerRunner;
use crate::application::use_cases::{PipelinePorts, ProcessDeploymentEventUseCase};
use crate::config::{Backend, ScanConfig};
use crate::ports::outbound::{AlertNotifier, BlobStore, JobRunner, MetadataStore};
use crate::shared::Result;
use std::sync::Arc;

/// Ports resolved to trait objects, as selected from configuration.
pub type DynPipelinePorts = PipelinePorts<
    Arc<dyn MetadataStore>,
    Arc<dyn BlobStore>,
    Arc<dyn JobRunner>,
    Arc<dyn AlertNotifier>,
    SystemClock,
>;

/// The event pipeline wired against configured adapters.
pub type Pipeline = ProcessDeploymentEventUseCase<
    Arc<dyn MetadataStore>,
    Arc<dyn BlobStore>,
    Arc<dyn JobRunner>,
    Arc<dyn AlertNotifier>,
    SystemClock,
>;

/// Factory for wiring infrastructure adapters into the pipeline
///
/// It belongs in the application layer as it selects adapters based on the
/// resolved configuration; the use cases only ever see the ports.
pub struct AdapterFactory;

impl AdapterFactory {
    /// Builds the event pipeline for the configured backend
    ///
    /// # Errors
    /// Fails when Google Cloud credentials cannot be discovered (`gcp` backend)
    pub async fn build_pipeline(config: &ScanConfig) -> Result<Pipeline> {
        let ports = Self::create_ports(config).await?;
        Ok(ProcessDeploymentEventUseCase::new(
            ports,
            config.pipeline_settings(),
        ))
    }

    /// Creates the adapters for the configured backend
    pub async fn create_ports(config: &ScanConfig) -> Result<DynPipelinePorts> {
        match config.backend {
            Backend::Gcp => {
                let client = GoogleApiClient::from_environment().await?;
                Self::gcp_ports(config, client)
            }
            Backend::Local => Ok(Self::local_ports(config)),
        }
    }

    /// Cloud Run Jobs, Cloud Storage, Firestore, log alerts plus Pub/Sub when a topic is set
    pub fn gcp_ports(config: &ScanConfig, client: GoogleApiClient) -> Result<DynPipelinePorts> {
        let bucket = config.results_bucket.clone().ok_or_else(|| {
            anyhow::anyhow!("the gcp backend requires a results bucket")
        })?;

        let log: Arc<dyn AlertNotifier> = Arc::new(LogNotifier::new());
        let mut notifiers = vec![log];
        if let Some(topic) = &config.notification_topic {
            let pubsub: Arc<dyn AlertNotifier> =
                Arc::new(PubSubNotifier::new(client.clone(), &config.project_id, topic));
            notifiers.push(pubsub);
        }

        tracing::info!(
            backend = %config.backend,
            project_id = %config.project_id,
            region = %config.region,
            bucket = %bucket,
            notifiers = notifiers.len(),
            "pipeline adapters configured"
        );

        Ok(PipelinePorts {
            metadata: Arc::new(FirestoreMetadataStore::new(client.clone(), &config.project_id)),
            blobs: Arc::new(GcsBlobStore::new(client.clone(), bucket)),
            runner: Arc::new(CloudRunJobRunner::new(
                client,
                CloudRunJobsConfig::new(&config.project_id, &config.region),
            )),
            notifiers,
            clock: SystemClock,
        })
    }

    /// Scanner subprocess, filesystem stores under `results_dir`, log alerts
    pub fn local_ports(config: &ScanConfig) -> DynPipelinePorts {
        let root = &config.local.results_dir;
        let log: Arc<dyn AlertNotifier> = Arc::new(LogNotifier::new());
        tracing::info!(
            backend = %config.backend,
            results_dir = %root.display(),
            scanner = %config.local.scanner_binary,
            "pipeline adapters configured"
        );

        PipelinePorts {
            metadata: Arc::new(FileSystemMetadataStore::new(root.join("metadata"))),
            blobs: Arc::new(FileSystemBlobStore::new(root.join("blobs"))),
            runner: Arc::new(
                LocalScannerRunner::new(config.local.scanner_binary.clone())
                    .with_leading_args(config.local.scanner_args.clone()),
            ),
            notifiers: vec![log],
            clock: SystemClock,
        }
    }
}
