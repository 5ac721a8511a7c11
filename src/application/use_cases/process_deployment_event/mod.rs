use crate::application::dto::{
    EventState, EventSummary, FailureKind, ImageOutcome, ImageStage, PipelineSettings,
    ScanContext,
};
use crate::application::use_cases::{
    AlertDelivery, CacheCheck, DedupCache, JobDispatcher, PersistenceWriter, ResultCollector,
};
use crate::ports::inbound::DeploymentEventPort;
use crate::ports::outbound::{AlertNotifier, BlobStore, Clock, JobRunner, MetadataStore};
use crate::scan_orchestration::domain::{DeploymentEvent, ImageReference};
use crate::scan_orchestration::policies::CachePolicy;
use crate::scan_orchestration::services::{AlertEvaluator, EventDecoder};
use crate::shared::error::ScanTriggerError;
use crate::shared::logging::{event_span, image_span};
use crate::shared::Result;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Infrastructure the event pipeline runs against.
pub struct PipelinePorts<M, B, J, N, C> {
    pub metadata: M,
    pub blobs: B,
    pub runner: J,
    pub notifiers: Vec<N>,
    pub clock: C,
}

/// ProcessDeploymentEventUseCase - Orchestrates one deployment event
///
/// Decodes the envelope, then runs every distinct image through
/// cache check → dispatch → collect → persist → alert with bounded
/// concurrency. Per-image failures are recorded and never affect the other
/// images; only an undecodable envelope fails the whole invocation.
///
/// # Type Parameters
/// * `M` - MetadataStore implementation
/// * `B` - BlobStore implementation
/// * `J` - JobRunner implementation
/// * `N` - AlertNotifier implementation
/// * `C` - Clock implementation
pub struct ProcessDeploymentEventUseCase<M, B, J, N, C> {
    dedup: DedupCache<M, C>,
    dispatcher: JobDispatcher<J, C>,
    collector: ResultCollector<J>,
    writer: PersistenceWriter<B, M, C>,
    alerts: AlertDelivery<N>,
    clock: C,
    settings: PipelineSettings,
}

impl<M, B, J, N, C> ProcessDeploymentEventUseCase<M, B, J, N, C>
where
    M: MetadataStore + Clone,
    B: BlobStore,
    J: JobRunner + Clone + 'static,
    N: AlertNotifier,
    C: Clock + Clone,
{
    pub fn new(ports: PipelinePorts<M, B, J, N, C>, settings: PipelineSettings) -> Self {
        let cache_policy = CachePolicy::new(settings.cache_hours, settings.cache_tag_references);
        Self {
            dedup: DedupCache::new(ports.metadata.clone(), ports.clock.clone(), cache_policy),
            dispatcher: JobDispatcher::new(ports.runner.clone(), ports.clock.clone(), settings.clone()),
            collector: ResultCollector::new(ports.runner),
            writer: PersistenceWriter::new(
                ports.blobs,
                ports.metadata,
                ports.clock.clone(),
                cache_policy,
            ),
            alerts: AlertDelivery::new(AlertEvaluator::new(settings.alert_threshold), ports.notifiers),
            clock: ports.clock,
            settings,
        }
    }

    /// Executes the pipeline for one raw envelope
    ///
    /// # Arguments
    /// * `raw` - Envelope bytes as delivered by the transport
    /// * `cancel` - Stops job waits early (e.g. on instance shutdown)
    ///
    /// # Returns
    /// A `Completed` summary with one outcome per distinct image
    pub async fn execute(&self, raw: &[u8], cancel: CancellationToken) -> Result<EventSummary> {
        tracing::info!(state = %EventState::Received, bytes = raw.len(), "deployment event received");

        let event = EventDecoder::decode(raw, self.clock.now()).inspect_err(|e| {
            tracing::error!(error = %e, "dropping malformed deployment event");
        })?;

        let span = event_span(event.event_id(), event.service_name());
        self.process_event(&event, &cancel).instrument(span).await
    }

    async fn process_event(
        &self,
        event: &DeploymentEvent,
        cancel: &CancellationToken,
    ) -> Result<EventSummary> {
        let images = event.distinct_images();
        tracing::info!(
            state = %EventState::Decoded,
            method = %event.method(),
            project_id = event.project_id(),
            region = event.region(),
            revision = event.revision_id().unwrap_or("-"),
            images = images.len(),
            "deployment event decoded"
        );

        let context = ScanContext::from_event(event);
        let deadline = Instant::now() + self.settings.wait_budget();
        let concurrency = self.settings.max_concurrent_scans.max(1);

        let pipelines: Vec<_> = images
            .iter()
            .map(|image| {
                let span = image_span(&image.full_name());
                self.process_image(image, &context, deadline, cancel)
                    .instrument(span)
            })
            .collect();
        let outcomes: Vec<ImageOutcome> = stream::iter(pipelines)
            .buffered(concurrency)
            .collect()
            .await;

        let summary = EventSummary {
            event_id: event.event_id().to_string(),
            service_name: event.service_name().to_string(),
            state: EventState::Completed,
            outcomes,
        };

        tracing::info!(
            state = %summary.state,
            persisted = summary.persisted(),
            skipped = summary.skipped(),
            failed = summary.failed(),
            alerted = summary.alerted(),
            "deployment event completed"
        );
        Ok(summary)
    }

    async fn process_image(
        &self,
        image: &ImageReference,
        context: &ScanContext,
        deadline: Instant,
        cancel: &CancellationToken,
    ) -> ImageOutcome {
        let check = self.dedup.check(image).await;
        tracing::debug!(stage = %ImageStage::CacheChecked, "cache checked");
        if let CacheCheck::Fresh(record) = check {
            return ImageOutcome::Skipped {
                image: image.full_name(),
                previous_scan_id: Some(record.scan_id),
            };
        }

        if cancel.is_cancelled() {
            let error = anyhow::anyhow!("invocation cancelled before the scan job was dispatched");
            return self
                .fail(image, context, FailureKind::DispatchFailed, error)
                .await;
        }

        let spec = self.dispatcher.build_spec(image, context);
        let job = match self.dispatcher.dispatch(&spec, Some(deadline), cancel).await {
            Ok(job) => job,
            Err(e) => return self.fail(image, context, FailureKind::DispatchFailed, e).await,
        };
        tracing::info!(stage = %ImageStage::Dispatched, job = %job.handle(), "scan dispatched");

        let outcome = self
            .dispatcher
            .await_completion(&job, spec.timeout, Some(deadline), cancel)
            .await;
        let collected = self.collector.collect(image, &outcome).await;
        job.release().await;

        let report = match collected {
            Ok(report) => report,
            Err(e) => {
                let kind = classify(&e);
                return self.fail(image, context, kind, e).await;
            }
        };
        tracing::info!(stage = %ImageStage::Collected, findings = report.findings().len(), "scan collected");

        let record = match self.writer.store(image, &report, context).await {
            Ok(record) => record,
            Err(e) => return self.fail(image, context, FailureKind::Persistence, e).await,
        };
        tracing::info!(stage = %ImageStage::Persisted, scan_id = %record.scan_id, "scan persisted");

        let decision = self.alerts.evaluate_and_notify(&record).await;
        if decision.fire {
            tracing::info!(
                stage = %ImageStage::Alerted,
                matching = decision.matching_findings,
                threshold = %decision.threshold,
                "alert raised"
            );
        }

        ImageOutcome::Persisted {
            image: image.full_name(),
            severity: record.severity_summary(),
            scan_id: record.scan_id,
            result_blob_path: record.result_blob_path,
            alerted: decision.fire,
        }
    }

    async fn fail(
        &self,
        image: &ImageReference,
        context: &ScanContext,
        kind: FailureKind,
        error: anyhow::Error,
    ) -> ImageOutcome {
        tracing::error!(image = %image, kind = %kind, error = %format!("{:#}", error), "image scan failed");
        self.writer.record_failure(image, context, kind, &error).await;
        ImageOutcome::Failed {
            image: image.full_name(),
            kind,
            error: format!("{:#}", error),
        }
    }
}

/// Maps a collection error to the failure kind recorded for the image.
fn classify(error: &anyhow::Error) -> FailureKind {
    match error.downcast_ref::<ScanTriggerError>() {
        Some(ScanTriggerError::ScanTimedOut { .. }) => FailureKind::ScanTimedOut,
        Some(ScanTriggerError::ReportParse { .. }) => FailureKind::ReportParse,
        Some(ScanTriggerError::Persistence { .. }) => FailureKind::Persistence,
        _ => FailureKind::ScanFailed,
    }
}

#[async_trait]
impl<M, B, J, N, C> DeploymentEventPort for ProcessDeploymentEventUseCase<M, B, J, N, C>
where
    M: MetadataStore + Clone,
    B: BlobStore,
    J: JobRunner + Clone + 'static,
    N: AlertNotifier,
    C: Clock + Clone,
{
    async fn handle_event(&self, raw: &[u8], cancel: CancellationToken) -> Result<EventSummary> {
        self.execute(raw, cancel).await
    }
}
