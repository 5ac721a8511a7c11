use crate::scan_orchestration::domain::{JobHandle, JobStatus, OutputLocation, ScanJobSpec};
use crate::shared::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// JobRunner port for ephemeral scanner jobs
///
/// One job runs the scanner against one image. The runner is responsible
/// for resolving the job's `AccessTokenSource` and handing the value to
/// the job as a credential; it never appears in the job's arguments.
///
/// # Lifecycle
/// `launch` → `poll`* → (`terminate` on timeout) → `read_output` → `delete`.
/// `delete` must be idempotent: it may be called after a failed launch or
/// more than once for the same job.
#[async_trait]
pub trait JobRunner: Send + Sync {
    /// Creates the job resource and starts one execution
    ///
    /// Stops waiting for the job to be created once `cancel` fires. A failed
    /// or cancelled launch must not leave a job resource behind.
    async fn launch(&self, spec: &ScanJobSpec, cancel: &CancellationToken) -> Result<JobHandle>;

    /// Reports the current status of the job's execution
    async fn poll(&self, job: &JobHandle) -> Result<JobStatus>;

    /// Reads the scanner output of a finished job
    async fn read_output(&self, output: &OutputLocation) -> Result<String>;

    /// Force-stops a running execution
    async fn terminate(&self, job: &JobHandle) -> Result<()>;

    /// Deletes the job resource
    async fn delete(&self, job: &JobHandle) -> Result<()>;
}

#[async_trait]
impl<T: JobRunner + ?Sized> JobRunner for Arc<T> {
    async fn launch(&self, spec: &ScanJobSpec, cancel: &CancellationToken) -> Result<JobHandle> {
        (**self).launch(spec, cancel).await
    }

    async fn poll(&self, job: &JobHandle) -> Result<JobStatus> {
        (**self).poll(job).await
    }

    async fn read_output(&self, output: &OutputLocation) -> Result<String> {
        (**self).read_output(output).await
    }

    async fn terminate(&self, job: &JobHandle) -> Result<()> {
        (**self).terminate(job).await
    }

    async fn delete(&self, job: &JobHandle) -> Result<()> {
        (**self).delete(job).await
    }
}
