use super::ImageReference;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Environment variable through which the scanner receives its access token.
pub const SCANNER_TOKEN_ENV: &str = "QUALYS_ACCESS_TOKEN";

/// Where the scanner's access token comes from.
///
/// Only a reference travels with the job spec; the token value itself is
/// resolved by the job runner at launch time and injected into the job's
/// environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessTokenSource {
    /// A Secret Manager secret (`projects/../secrets/..` or a bare secret id) and version.
    SecretVersion { secret: String, version: String },
    /// An environment variable of the trigger process.
    Environment { variable: String },
}

impl fmt::Display for AccessTokenSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessTokenSource::SecretVersion { secret, version } => {
                write!(f, "secret {}@{}", secret, version)
            }
            AccessTokenSource::Environment { variable } => write!(f, "env ${}", variable),
        }
    }
}

/// Description of one ephemeral scan job.
///
/// Owned by the dispatch call that created it and never persisted.
#[derive(Debug, Clone)]
pub struct ScanJobSpec {
    pub job_name: String,
    pub image: ImageReference,
    pub scanner_image: String,
    pub pod_endpoint: String,
    pub access_token: AccessTokenSource,
    pub timeout: Duration,
    pub service_account: Option<String>,
    pub tags: BTreeMap<String, String>,
}

impl ScanJobSpec {
    /// Scanner command line. The access token is deliberately absent.
    pub fn scanner_args(&self) -> Vec<String> {
        let mut args = vec![
            "image".to_string(),
            self.image.full_name(),
            "--pod".to_string(),
            self.pod_endpoint.clone(),
            "--skip-verify-tls".to_string(),
            "--output-format".to_string(),
            "json".to_string(),
        ];
        for (key, value) in &self.tags {
            args.push("--tag".to_string());
            args.push(format!("{}={}", key, value));
        }
        args
    }
}

/// Opaque reference to a launched job, issued by the job runner.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobHandle {
    /// Name of the job resource (deleted after the outcome is read).
    pub job_name: String,
    /// Runner-specific execution identifier.
    pub execution: String,
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.job_name)
    }
}

/// Where a finished job's output can be read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLocation(pub String);

impl fmt::Display for OutputLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Status reported by a job runner on each poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded { output: OutputLocation },
    Failed { exit_code: Option<i32>, detail: String },
}

/// Lifecycle state of a dispatched job as tracked by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Running,
    Succeeded,
    Failed,
    TimedOut,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobState::Succeeded | JobState::Failed | JobState::TimedOut
        )
    }

    /// Applies a polled status. Terminal states absorb further updates.
    pub fn advance(self, status: &JobStatus) -> JobState {
        if self.is_terminal() {
            return self;
        }
        match status {
            JobStatus::Pending if self == JobState::Running => JobState::Running,
            JobStatus::Pending => JobState::Pending,
            JobStatus::Running => JobState::Running,
            JobStatus::Succeeded { .. } => JobState::Succeeded,
            JobStatus::Failed { .. } => JobState::Failed,
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobState::Pending => "pending",
            JobState::Running => "running",
            JobState::Succeeded => "succeeded",
            JobState::Failed => "failed",
            JobState::TimedOut => "timed_out",
        };
        write!(f, "{}", name)
    }
}

/// Why waiting for a job stopped before it reached a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutReason {
    /// The configured scan timeout elapsed.
    ScanTimeout,
    /// The invocation deadline (minus the cleanup reserve) was reached.
    InvocationDeadline,
    /// The invocation was cancelled (e.g. the instance is shutting down).
    Cancelled,
}

impl fmt::Display for TimeoutReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeoutReason::ScanTimeout => write!(f, "scan timeout"),
            TimeoutReason::InvocationDeadline => write!(f, "invocation deadline"),
            TimeoutReason::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Final result of waiting for a scan job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Succeeded {
        job: JobHandle,
        output: OutputLocation,
    },
    Failed {
        job: JobHandle,
        exit_code: Option<i32>,
        detail: String,
    },
    TimedOut {
        job: JobHandle,
        elapsed: Duration,
        reason: TimeoutReason,
    },
}

impl JobOutcome {
    pub fn job(&self) -> &JobHandle {
        match self {
            JobOutcome::Succeeded { job, .. }
            | JobOutcome::Failed { job, .. }
            | JobOutcome::TimedOut { job, .. } => job,
        }
    }

    pub fn state(&self) -> JobState {
        match self {
            JobOutcome::Succeeded { .. } => JobState::Succeeded,
            JobOutcome::Failed { .. } => JobState::Failed,
            JobOutcome::TimedOut { .. } => JobState::TimedOut,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> ScanJobSpec {
        let mut tags = BTreeMap::new();
        tags.insert("service_name".to_string(), "checkout".to_string());
        ScanJobSpec {
            job_name: "qscanner-app-v1-20260101000000-abcd".to_string(),
            image: ImageReference::parse("gcr.io/p/app:v1").unwrap(),
            scanner_image: "qualys/qscanner:latest".to_string(),
            pod_endpoint: "US2".to_string(),
            access_token: AccessTokenSource::Environment {
                variable: "QUALYS_ACCESS_TOKEN".to_string(),
            },
            timeout: Duration::from_secs(1800),
            service_account: None,
            tags,
        }
    }

    #[test]
    fn test_scanner_args_contract() {
        let args = spec().scanner_args();
        assert_eq!(
            &args[..7],
            &[
                "image",
                "gcr.io/p/app:v1",
                "--pod",
                "US2",
                "--skip-verify-tls",
                "--output-format",
                "json"
            ]
        );
        assert_eq!(&args[7..], &["--tag", "service_name=checkout"]);
    }

    #[test]
    fn test_scanner_args_never_contain_token() {
        let args = spec().scanner_args();
        assert!(!args.iter().any(|a| a.contains("QUALYS_ACCESS_TOKEN")));
        assert!(!args.iter().any(|a| a.contains("token")));
    }

    #[test]
    fn test_job_state_transitions() {
        let output = OutputLocation("logs".to_string());
        let state = JobState::Pending;
        let state = state.advance(&JobStatus::Pending);
        assert_eq!(state, JobState::Pending);
        let state = state.advance(&JobStatus::Running);
        assert_eq!(state, JobState::Running);
        let state = state.advance(&JobStatus::Pending);
        assert_eq!(state, JobState::Running);
        let state = state.advance(&JobStatus::Succeeded { output });
        assert_eq!(state, JobState::Succeeded);
        assert!(state.is_terminal());
    }

    #[test]
    fn test_terminal_states_absorb_updates() {
        assert_eq!(
            JobState::TimedOut.advance(&JobStatus::Running),
            JobState::TimedOut
        );
        assert_eq!(
            JobState::Failed.advance(&JobStatus::Succeeded {
                output: OutputLocation("x".to_string())
            }),
            JobState::Failed
        );
    }
}
