use crate::application::dto::{PipelineSettings, ScanContext};
use crate::ports::outbound::{Clock, JobRunner};
use crate::scan_orchestration::domain::{
    ImageReference, JobHandle, JobOutcome, JobState, JobStatus, ScanJobSpec, TimeoutReason,
};
use crate::scan_orchestration::policies::JobNaming;
use crate::shared::Result;
use anyhow::Context;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// A launched job that must be deleted.
///
/// Call [`ActiveJob::release`] once the outcome has been read. If the guard
/// is dropped without being released (early return, cancelled future, panic)
/// the deletion is spawned onto the current runtime instead.
pub struct ActiveJob<J>
where
    J: JobRunner + Clone + 'static,
{
    runner: J,
    handle: JobHandle,
    released: bool,
}

impl<J> ActiveJob<J>
where
    J: JobRunner + Clone + 'static,
{
    pub fn handle(&self) -> &JobHandle {
        &self.handle
    }

    /// Deletes the job resource. Failures are logged, not returned.
    pub async fn release(mut self) {
        self.released = true;
        match self.runner.delete(&self.handle).await {
            Ok(()) => tracing::info!(job = %self.handle, "scan job deleted"),
            Err(e) => tracing::warn!(job = %self.handle, error = %e, "failed to delete scan job"),
        }
    }
}

impl<J> Drop for ActiveJob<J>
where
    J: JobRunner + Clone + 'static,
{
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let runner = self.runner.clone();
        let handle = self.handle.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                tracing::warn!(job = %handle, "scan job guard dropped, deleting in background");
                runtime.spawn(async move {
                    if let Err(e) = runner.delete(&handle).await {
                        tracing::error!(job = %handle, error = %e, "background job deletion failed");
                    }
                });
            }
            Err(_) => {
                tracing::error!(job = %handle, "no async runtime available, scan job left behind");
            }
        }
    }
}

/// JobDispatcher - Launches one scanner job per image and waits for it
///
/// Waiting is bounded three ways: the scan timeout, the invocation deadline
/// passed in by the caller, and a cancellation token. Whichever comes first
/// ends the wait with a `TimedOut` outcome after the execution is
/// force-stopped.
///
/// # Type Parameters
/// * `J` - JobRunner implementation
/// * `C` - Clock implementation
pub struct JobDispatcher<J, C> {
    runner: J,
    clock: C,
    settings: PipelineSettings,
}

impl<J, C> JobDispatcher<J, C>
where
    J: JobRunner + Clone + 'static,
    C: Clock,
{
    pub fn new(runner: J, clock: C, settings: PipelineSettings) -> Self {
        Self {
            runner,
            clock,
            settings,
        }
    }

    /// Builds the job description for `image`, tagged with the deployment it belongs to
    pub fn build_spec(&self, image: &ImageReference, context: &ScanContext) -> ScanJobSpec {
        let mut tags = BTreeMap::new();
        tags.insert("project_id".to_string(), context.project_id.clone());
        tags.insert("region".to_string(), context.region.clone());
        tags.insert("service_name".to_string(), context.service_name.clone());
        if let Some(revision) = &context.revision_id {
            tags.insert("revision".to_string(), revision.clone());
        }

        ScanJobSpec {
            job_name: JobNaming::generate(image, self.clock.now()),
            image: image.clone(),
            scanner_image: self.settings.scanner_image.clone(),
            pod_endpoint: self.settings.pod_endpoint.clone(),
            access_token: self.settings.access_token.clone(),
            timeout: self.settings.scan_timeout,
            service_account: self.settings.job_service_account.clone(),
            tags,
        }
    }

    /// Launches the job and returns the guard that owns its cleanup
    ///
    /// The launch is asked to give up when `cancel` fires or `deadline`
    /// passes; the runner then removes whatever it already created.
    pub async fn dispatch(
        &self,
        spec: &ScanJobSpec,
        deadline: Option<Instant>,
        cancel: &CancellationToken,
    ) -> Result<ActiveJob<J>> {
        let launch_cancel = cancel.child_token();
        let launch = self.runner.launch(spec, &launch_cancel);
        tokio::pin!(launch);
        let launched = tokio::select! {
            result = &mut launch => result,
            _ = wait_until(deadline) => {
                tracing::warn!(job = %spec.job_name, "invocation deadline reached during launch, cancelling");
                launch_cancel.cancel();
                launch.await
            }
        };
        let handle = launched
            .with_context(|| format!("Failed to launch scan job {} for {}", spec.job_name, spec.image))?;

        tracing::info!(
            job = %handle,
            execution = %handle.execution,
            image = %spec.image,
            "scan job launched"
        );

        Ok(ActiveJob {
            runner: self.runner.clone(),
            handle,
            released: false,
        })
    }

    /// Polls the job until it finishes or one of the wait bounds is hit
    ///
    /// # Arguments
    /// * `job` - Guard returned by [`JobDispatcher::dispatch`]
    /// * `timeout` - Scan timeout for this job
    /// * `deadline` - Point after which the invocation can no longer wait
    /// * `cancel` - Cancellation of the whole invocation
    ///
    /// # Returns
    /// The job outcome. Poll errors are logged and retried on the next tick;
    /// they never end the wait on their own.
    pub async fn await_completion(
        &self,
        job: &ActiveJob<J>,
        timeout: Duration,
        deadline: Option<Instant>,
        cancel: &CancellationToken,
    ) -> JobOutcome {
        let handle = job.handle();
        let started = Instant::now();
        let scan_deadline = started + timeout;
        let (limit, limit_reason) = match deadline {
            Some(invocation_deadline) if invocation_deadline < scan_deadline => {
                (invocation_deadline, TimeoutReason::InvocationDeadline)
            }
            _ => (scan_deadline, TimeoutReason::ScanTimeout),
        };

        let mut state = JobState::Pending;
        let reason = loop {
            let polled = tokio::select! {
                _ = cancel.cancelled() => break TimeoutReason::Cancelled,
                _ = tokio::time::sleep_until(limit) => break limit_reason,
                result = self.runner.poll(handle) => result,
            };

            match polled {
                Ok(status) => {
                    let next = state.advance(&status);
                    if next != state {
                        tracing::info!(job = %handle, from = %state, to = %next, "job state changed");
                        state = next;
                    }
                    match status {
                        JobStatus::Succeeded { output } => {
                            return JobOutcome::Succeeded {
                                job: handle.clone(),
                                output,
                            };
                        }
                        JobStatus::Failed { exit_code, detail } => {
                            return JobOutcome::Failed {
                                job: handle.clone(),
                                exit_code,
                                detail,
                            };
                        }
                        JobStatus::Pending | JobStatus::Running => {}
                    }
                }
                Err(e) => {
                    tracing::warn!(job = %handle, error = %e, "failed to poll job status, retrying");
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => break TimeoutReason::Cancelled,
                _ = tokio::time::sleep_until(limit) => break limit_reason,
                _ = tokio::time::sleep(self.settings.poll_interval) => {}
            }
        };

        let elapsed = started.elapsed();
        tracing::warn!(
            job = %handle,
            reason = %reason,
            elapsed_secs = elapsed.as_secs(),
            "scan job did not finish in time, terminating"
        );
        if let Err(e) = self.runner.terminate(handle).await {
            tracing::warn!(job = %handle, error = %e, "failed to terminate scan job");
        }

        JobOutcome::TimedOut {
            job: handle.clone(),
            elapsed,
            reason,
        }
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
