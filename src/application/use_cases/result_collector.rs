use crate::ports::outbound::JobRunner;
use crate::scan_orchestration::domain::{ImageReference, JobOutcome, ScanReport};
use crate::scan_orchestration::services::ReportParser;
use crate::shared::error::ScanTriggerError;
use crate::shared::Result;

/// ResultCollector - Turns a job outcome into a parsed scan report
///
/// Only a `Succeeded` outcome yields a report. `Failed` and `TimedOut`
/// become `ScanFailed` / `ScanTimedOut` errors so the orchestrator can record
/// them the same way it records a report that does not parse.
pub struct ResultCollector<J> {
    runner: J,
}

impl<J> ResultCollector<J>
where
    J: JobRunner,
{
    pub fn new(runner: J) -> Self {
        Self { runner }
    }

    pub async fn collect(&self, image: &ImageReference, outcome: &JobOutcome) -> Result<ScanReport> {
        match outcome {
            JobOutcome::Succeeded { job, output } => {
                let text = self.runner.read_output(output).await.map_err(|e| {
                    ScanTriggerError::ScanFailed {
                        image: image.full_name(),
                        job: job.job_name.clone(),
                        details: format!("could not read scanner output from {}: {:#}", output, e),
                    }
                })?;

                let report = ReportParser::parse(&image.full_name(), &text)?;
                let summary = report.severity_summary();
                tracing::info!(
                    job = %job,
                    critical = summary.critical,
                    high = summary.high,
                    medium = summary.medium,
                    low = summary.low,
                    total = summary.total(),
                    "scanner report parsed"
                );
                Ok(report)
            }
            JobOutcome::Failed {
                job,
                exit_code,
                detail,
            } => {
                let details = match exit_code {
                    Some(code) => format!("exit code {}: {}", code, detail),
                    None => detail.clone(),
                };
                Err(ScanTriggerError::ScanFailed {
                    image: image.full_name(),
                    job: job.job_name.clone(),
                    details,
                }
                .into())
            }
            JobOutcome::TimedOut {
                job,
                elapsed,
                reason,
            } => {
                tracing::debug!(job = %job, reason = %reason, "no report for timed out job");
                Err(ScanTriggerError::ScanTimedOut {
                    image: image.full_name(),
                    job: job.job_name.clone(),
                    elapsed_secs: elapsed.as_secs(),
                }
                .into())
            }
        }
    }
}
