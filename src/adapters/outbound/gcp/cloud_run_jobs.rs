//! Cloud Run Jobs v2 runner.
//!
//! Each scan is an ephemeral job: created, run once, polled through its
//! execution, and deleted by the dispatcher after the outcome is read. The
//! scanner writes its JSON report to stdout, so output is read back from
//! Cloud Logging using the execution name.

use super::client::{api_error, send, GoogleApiClient};
use crate::ports::outbound::JobRunner;
use crate::scan_orchestration::domain::{
    AccessTokenSource, JobHandle, JobStatus, OutputLocation, ScanJobSpec, SCANNER_TOKEN_ENV,
};
use crate::scan_orchestration::services::MAX_SCANNER_OUTPUT_BYTES;
use crate::shared::Result;
use anyhow::Context;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Endpoints and limits of the Cloud Run Jobs runner.
#[derive(Debug, Clone)]
pub struct CloudRunJobsConfig {
    pub project_id: String,
    pub region: String,
    pub run_endpoint: String,
    pub logging_endpoint: String,
    /// Interval between long-running operation polls
    pub operation_poll_interval: Duration,
    /// Upper bound on waiting for job creation
    pub operation_timeout: Duration,
    /// Attempts at reading logs while Cloud Logging catches up
    pub log_read_attempts: u32,
    pub log_read_backoff: Duration,
}

impl CloudRunJobsConfig {
    #[must_use]
    pub fn new(project_id: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            region: region.into(),
            run_endpoint: "https://run.googleapis.com/v2".to_string(),
            logging_endpoint: "https://logging.googleapis.com/v2".to_string(),
            operation_poll_interval: Duration::from_secs(2),
            operation_timeout: Duration::from_secs(120),
            log_read_attempts: 3,
            log_read_backoff: Duration::from_secs(5),
        }
    }

    /// Points both APIs at one endpoint (emulators, tests)
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        let endpoint = endpoint.trim_end_matches('/');
        self.run_endpoint = endpoint.to_string();
        self.logging_endpoint = endpoint.to_string();
        self
    }

    #[must_use]
    pub fn location_path(&self) -> String {
        format!("projects/{}/locations/{}", self.project_id, self.region)
    }

    #[must_use]
    pub fn job_path(&self, job_name: &str) -> String {
        format!("{}/jobs/{}", self.location_path(), job_name)
    }
}

#[derive(Debug, Clone)]
pub struct CloudRunJobRunner {
    client: GoogleApiClient,
    config: CloudRunJobsConfig,
}

#[derive(Debug, Deserialize)]
struct Operation {
    name: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<OperationError>,
    #[serde(default)]
    metadata: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct OperationError {
    #[serde(default)]
    code: i32,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Execution {
    #[serde(default)]
    running_count: u32,
    #[serde(default)]
    succeeded_count: u32,
    #[serde(default)]
    failed_count: u32,
    #[serde(default)]
    cancelled_count: u32,
    #[serde(default)]
    conditions: Vec<Condition>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Condition {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    state: String,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListEntriesResponse {
    #[serde(default)]
    entries: Vec<LogEntry>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LogEntry {
    #[serde(default)]
    text_payload: Option<String>,
    #[serde(default)]
    json_payload: Option<Value>,
}

impl CloudRunJobRunner {
    pub fn new(client: GoogleApiClient, config: CloudRunJobsConfig) -> Self {
        Self { client, config }
    }

    fn api_url(&self, resource: &str) -> String {
        format!("{}/{}", self.config.run_endpoint, resource)
    }

    /// Request body of `jobs.create`
    fn job_body(spec: &ScanJobSpec) -> Result<Value> {
        let token_env = match &spec.access_token {
            AccessTokenSource::SecretVersion { secret, version } => json!({
                "name": SCANNER_TOKEN_ENV,
                "valueSource": { "secretKeyRef": { "secret": secret, "version": version } }
            }),
            AccessTokenSource::Environment { variable } => {
                let value = std::env::var(variable).with_context(|| {
                    format!(
                        "Scanner access token variable {} is not set\n\n💡 Hint: Configure QUALYS_TOKEN_SECRET to read the token from Secret Manager",
                        variable
                    )
                })?;
                json!({ "name": SCANNER_TOKEN_ENV, "value": value })
            }
        };

        let mut template = json!({
            "containers": [{
                "image": spec.scanner_image,
                "args": spec.scanner_args(),
                "env": [token_env],
                "resources": { "limits": { "cpu": "2", "memory": "4Gi" } }
            }],
            "timeout": format!("{}s", spec.timeout.as_secs().max(1)),
            "maxRetries": 0
        });
        if let Some(account) = &spec.service_account {
            template["serviceAccount"] = json!(account);
        }

        let mut labels: Map<String, Value> = spec
            .tags
            .iter()
            .map(|(k, v)| (label_value(k), json!(label_value(v))))
            .collect();
        labels.insert("managed-by".to_string(), json!("cloudrun-scan-trigger"));

        Ok(json!({
            "labels": labels,
            "template": {
                "taskCount": 1,
                "parallelism": 1,
                "template": template
            }
        }))
    }

    async fn wait_for_operation(
        &self,
        mut operation: Operation,
        what: &str,
        cancel: &CancellationToken,
    ) -> Result<Operation> {
        let started = tokio::time::Instant::now();
        while !operation.done {
            if started.elapsed() >= self.config.operation_timeout {
                anyhow::bail!(
                    "{} did not finish within {:?} (operation {})",
                    what,
                    self.config.operation_timeout,
                    operation.name
                );
            }
            tokio::select! {
                _ = cancel.cancelled() => {
                    anyhow::bail!("{} cancelled while waiting for operation {}", what, operation.name);
                }
                _ = tokio::time::sleep(self.config.operation_poll_interval) => {}
            }
            let request = self.client.get(&self.api_url(&operation.name)).await?;
            operation = self.client.send_json(request, what).await?;
        }
        if let Some(error) = &operation.error {
            anyhow::bail!("{} failed: {} (code {})", what, error.message, error.code);
        }
        Ok(operation)
    }

    /// Sends `jobs.create`; the job may exist as soon as this returns `Ok`
    async fn create_job(&self, spec: &ScanJobSpec) -> Result<Operation> {
        let url = format!(
            "{}?jobId={}",
            self.api_url(&format!("{}/jobs", self.config.location_path())),
            urlencoding::encode(&spec.job_name)
        );
        let request = self.client.post(&url).await?.json(&Self::job_body(spec)?);
        self.client
            .send_json(request, &format!("create job {}", spec.job_name))
            .await
    }

    /// Waits for creation to finish, then starts the single execution
    async fn start_created_job(
        &self,
        spec: &ScanJobSpec,
        operation: Operation,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let what = format!("create job {}", spec.job_name);
        self.wait_for_operation(operation, &what, cancel).await?;
        if cancel.is_cancelled() {
            anyhow::bail!("{} cancelled before the execution was started", what);
        }
        self.run_job(&spec.job_name).await
    }

    async fn run_job(&self, job_name: &str) -> Result<String> {
        let what = format!("run job {}", job_name);
        let url = format!("{}:run", self.api_url(&self.config.job_path(job_name)));
        let request = self.client.post(&url).await?.json(&json!({}));
        let operation: Operation = self.client.send_json(request, &what).await?;
        if let Some(error) = &operation.error {
            anyhow::bail!("{} failed: {} (code {})", what, error.message, error.code);
        }
        execution_name(&operation)
            .with_context(|| format!("{}: operation {} has no execution", what, operation.name))
    }

    async fn read_logs_once(&self, execution_id: &str) -> Result<String> {
        let url = format!("{}/entries:list", self.config.logging_endpoint);
        let filter = log_filter(&self.config.project_id, execution_id);
        let mut output = String::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut body = json!({
                "resourceNames": [format!("projects/{}", self.config.project_id)],
                "filter": filter,
                "orderBy": "timestamp asc",
                "pageSize": 1000
            });
            if let Some(token) = &page_token {
                body["pageToken"] = json!(token);
            }
            let request = self.client.post(&url).await?.json(&body);
            let page: ListEntriesResponse = self
                .client
                .send_json(request, &format!("read logs of {}", execution_id))
                .await?;

            for entry in page.entries {
                if let Some(text) = entry.text_payload {
                    output.push_str(&text);
                    output.push('\n');
                } else if let Some(payload) = entry.json_payload {
                    output.push_str(&payload.to_string());
                    output.push('\n');
                }
            }
            if output.len() > MAX_SCANNER_OUTPUT_BYTES {
                anyhow::bail!(
                    "scanner output of {} exceeds {} bytes",
                    execution_id,
                    MAX_SCANNER_OUTPUT_BYTES
                );
            }

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        Ok(output)
    }
}

#[async_trait]
impl JobRunner for CloudRunJobRunner {
    async fn launch(&self, spec: &ScanJobSpec, cancel: &CancellationToken) -> Result<JobHandle> {
        let operation = self.create_job(spec).await?;

        match self.start_created_job(spec, operation, cancel).await {
            Ok(execution) => Ok(JobHandle {
                job_name: spec.job_name.clone(),
                execution,
            }),
            Err(e) => {
                let handle = JobHandle {
                    job_name: spec.job_name.clone(),
                    execution: String::new(),
                };
                if let Err(cleanup) = self.delete(&handle).await {
                    tracing::warn!(job = %spec.job_name, error = %cleanup, "failed to delete job after launch failure");
                }
                Err(e)
            }
        }
    }

    async fn poll(&self, job: &JobHandle) -> Result<JobStatus> {
        let request = self.client.get(&self.api_url(&job.execution)).await?;
        let execution: Execution = self
            .client
            .send_json(request, &format!("get execution of {}", job))
            .await?;
        Ok(execution_status(&execution, &job.execution))
    }

    async fn read_output(&self, output: &OutputLocation) -> Result<String> {
        let attempts = self.config.log_read_attempts.max(1);
        for attempt in 1..=attempts {
            let text = self.read_logs_once(&output.0).await?;
            if !text.trim().is_empty() {
                return Ok(text);
            }
            if attempt < attempts {
                tracing::debug!(execution = %output, attempt, "no log entries yet, retrying");
                tokio::time::sleep(self.config.log_read_backoff).await;
            }
        }
        anyhow::bail!("no log entries found for execution {}", output)
    }

    async fn terminate(&self, job: &JobHandle) -> Result<()> {
        if job.execution.is_empty() {
            return Ok(());
        }
        let what = format!("cancel execution of {}", job);
        let url = format!("{}:cancel", self.api_url(&job.execution));
        let request = self.client.post(&url).await?.json(&json!({}));
        let response = send(request, &what).await?;
        match response.status() {
            // Already finished executions reject cancellation
            StatusCode::NOT_FOUND | StatusCode::BAD_REQUEST | StatusCode::CONFLICT => Ok(()),
            status if status.is_success() => Ok(()),
            _ => Err(api_error(response, &what).await),
        }
    }

    async fn delete(&self, job: &JobHandle) -> Result<()> {
        let what = format!("delete job {}", job);
        let url = self.api_url(&self.config.job_path(&job.job_name));
        let request = self.client.delete(&url).await?;
        let response = send(request, &what).await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(()),
            status if status.is_success() => Ok(()),
            _ => Err(api_error(response, &what).await),
        }
    }
}

/// Full execution resource name from a `jobs.run` operation
fn execution_name(operation: &Operation) -> Option<String> {
    operation
        .metadata
        .as_ref()
        .and_then(|m| m.get("name"))
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

fn execution_status(execution: &Execution, execution_name: &str) -> JobStatus {
    if execution.succeeded_count > 0 {
        let id = execution_name
            .rsplit('/')
            .next()
            .unwrap_or(execution_name)
            .to_string();
        return JobStatus::Succeeded {
            output: OutputLocation(id),
        };
    }
    if execution.failed_count > 0 || execution.cancelled_count > 0 {
        let detail = execution
            .conditions
            .iter()
            .find(|c| c.kind == "Completed" && c.state == "CONDITION_FAILED")
            .or_else(|| execution.conditions.iter().find(|c| c.state == "CONDITION_FAILED"))
            .and_then(|c| c.message.clone())
            .unwrap_or_else(|| {
                if execution.cancelled_count > 0 {
                    "execution was cancelled".to_string()
                } else {
                    "task failed".to_string()
                }
            });
        return JobStatus::Failed {
            exit_code: exit_code_from(&detail),
            detail,
        };
    }
    if execution.running_count > 0 {
        JobStatus::Running
    } else {
        JobStatus::Pending
    }
}

/// Cloud Run reports failures as "... failed with exit code N ..."
fn exit_code_from(message: &str) -> Option<i32> {
    let (_, rest) = message.split_once("exit code")?;
    let digits: String = rest
        .trim_start_matches([' ', ':'])
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '-')
        .collect();
    digits.parse().ok()
}

fn log_filter(project_id: &str, execution_id: &str) -> String {
    format!(
        r#"resource.type="cloud_run_job" AND labels."run.googleapis.com/execution_name"="{}" AND logName="projects/{}/logs/run.googleapis.com%2Fstdout""#,
        execution_id, project_id
    )
}

/// Label values allow lowercase letters, digits, `_` and `-`, up to 63 chars
fn label_value(raw: &str) -> String {
    raw.to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .take(63)
        .collect()
}
