use crate::ports::outbound::JobRunner;
use crate::scan_orchestration::domain::{
    AccessTokenSource, JobHandle, JobStatus, OutputLocation, ScanJobSpec, SCANNER_TOKEN_ENV,
};
use crate::scan_orchestration::services::MAX_SCANNER_OUTPUT_BYTES;
use crate::shared::security::read_regular_file;
use crate::shared::Result;
use anyhow::Context;
use async_trait::async_trait;
use dashmap::DashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Bytes of stderr kept as failure detail
const STDERR_TAIL_BYTES: usize = 2048;

struct LocalJob {
    child: Mutex<Child>,
    /// Holds captured stdout/stderr; removed with the job
    dir: TempDir,
}

impl LocalJob {
    fn stdout_path(&self) -> PathBuf {
        self.dir.path().join("stdout.json")
    }

    fn stderr_path(&self) -> PathBuf {
        self.dir.path().join("stderr.log")
    }
}

/// LocalScannerRunner runs the scanner CLI as a child process.
///
/// Each job gets its own temp directory for captured output. The access
/// token is passed only through the child's environment. `delete` drops
/// the job, which kills a still-running child and removes its directory.
#[derive(Clone)]
pub struct LocalScannerRunner {
    program: String,
    leading_args: Vec<String>,
    jobs: Arc<DashMap<String, Arc<LocalJob>>>,
}

impl LocalScannerRunner {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
            jobs: Arc::new(DashMap::new()),
        }
    }

    /// Arguments placed before the scanner arguments, e.g. a `docker run` prefix
    #[must_use]
    pub fn with_leading_args(mut self, args: Vec<String>) -> Self {
        self.leading_args = args;
        self
    }

    /// Number of jobs not yet deleted
    pub fn active_jobs(&self) -> usize {
        self.jobs.len()
    }

    fn job(&self, name: &str) -> Result<Arc<LocalJob>> {
        self.jobs
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .with_context(|| format!("unknown local job {}", name))
    }

    fn resolve_token(source: &AccessTokenSource) -> Result<String> {
        match source {
            AccessTokenSource::Environment { variable } => std::env::var(variable)
                .with_context(|| format!("Scanner access token variable {} is not set", variable)),
            AccessTokenSource::SecretVersion { secret, .. } => anyhow::bail!(
                "The local backend cannot read Secret Manager secret {}\n\n💡 Hint: Set QUALYS_TOKEN_ENV and export the token instead",
                secret
            ),
        }
    }

    fn stderr_tail(job: &LocalJob) -> String {
        match read_regular_file(&job.stderr_path(), MAX_SCANNER_OUTPUT_BYTES as u64) {
            Ok(Some(bytes)) => {
                let start = bytes.len().saturating_sub(STDERR_TAIL_BYTES);
                String::from_utf8_lossy(&bytes[start..]).trim().to_string()
            }
            _ => String::new(),
        }
    }
}

#[async_trait]
impl JobRunner for LocalScannerRunner {
    async fn launch(&self, spec: &ScanJobSpec, cancel: &CancellationToken) -> Result<JobHandle> {
        if cancel.is_cancelled() {
            anyhow::bail!("launch of {} cancelled before the scanner was started", spec.job_name);
        }
        let token = Self::resolve_token(&spec.access_token)?;
        let dir = tempfile::Builder::new()
            .prefix(&format!("{}-", spec.job_name))
            .tempdir()
            .context("Failed to create job directory")?;
        let stdout = std::fs::File::create(dir.path().join("stdout.json"))?;
        let stderr = std::fs::File::create(dir.path().join("stderr.log"))?;

        let child = Command::new(&self.program)
            .args(&self.leading_args)
            .args(spec.scanner_args())
            .env(SCANNER_TOKEN_ENV, token)
            .current_dir(dir.path())
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .kill_on_drop(true)
            .spawn()
            .with_context(|| {
                format!(
                    "Failed to start scanner '{}'\n\n💡 Hint: Install qscanner or set QSCANNER_BINARY",
                    self.program
                )
            })?;

        let execution = child
            .id()
            .map(|pid| format!("pid-{}", pid))
            .unwrap_or_else(|| spec.job_name.clone());
        tracing::debug!(job = %spec.job_name, execution = %execution, "scanner process started");

        self.jobs.insert(
            spec.job_name.clone(),
            Arc::new(LocalJob {
                child: Mutex::new(child),
                dir,
            }),
        );
        Ok(JobHandle {
            job_name: spec.job_name.clone(),
            execution,
        })
    }

    async fn poll(&self, handle: &JobHandle) -> Result<JobStatus> {
        let job = self.job(&handle.job_name)?;
        let exit = job.child.lock().await.try_wait()?;
        Ok(match exit {
            None => JobStatus::Running,
            Some(status) if status.success() => JobStatus::Succeeded {
                output: OutputLocation(handle.job_name.clone()),
            },
            Some(status) => {
                let tail = Self::stderr_tail(&job);
                JobStatus::Failed {
                    exit_code: status.code(),
                    detail: if tail.is_empty() {
                        format!("scanner exited with {}", status)
                    } else {
                        tail
                    },
                }
            }
        })
    }

    async fn read_output(&self, output: &OutputLocation) -> Result<String> {
        let job = self.job(&output.0)?;
        let path = job.stdout_path();
        let bytes = tokio::task::spawn_blocking(move || {
            read_regular_file(&path, MAX_SCANNER_OUTPUT_BYTES as u64)
        })
        .await??
        .with_context(|| format!("no captured output for {}", output))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn terminate(&self, handle: &JobHandle) -> Result<()> {
        let Ok(job) = self.job(&handle.job_name) else {
            return Ok(());
        };
        let mut child = job.child.lock().await;
        if child.try_wait()?.is_none() {
            child.kill().await.context("Failed to kill scanner process")?;
        }
        Ok(())
    }

    async fn delete(&self, handle: &JobHandle) -> Result<()> {
        if let Some((_, job)) = self.jobs.remove(&handle.job_name) {
            let mut child = job.child.lock().await;
            if child.try_wait()?.is_none() {
                child.kill().await.context("Failed to kill scanner process")?;
            }
        }
        Ok(())
    }
}
