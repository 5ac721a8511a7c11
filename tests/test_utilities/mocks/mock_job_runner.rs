use async_trait::async_trait;
use cloudrun_scan_trigger::prelude::*;
use cloudrun_scan_trigger::scan_orchestration::domain::{
    JobHandle, JobStatus, OutputLocation, ScanJobSpec,
};
use std::collections::HashMap;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// What a scripted job does for one image
#[derive(Debug, Clone)]
pub enum JobScript {
    /// Succeeds and prints the given report
    Succeed(String),
    /// Exits with the given code
    Fail(i32),
    /// Never finishes
    Hang,
    /// The job cannot be created
    LaunchError,
}

/// Mock JobRunner that plays a script per image and records every call
pub struct ScriptedJobRunner {
    scripts: HashMap<String, JobScript>,
    default_report: String,
    jobs: Mutex<HashMap<String, JobScript>>,
    pub launched: Mutex<Vec<ScanJobSpec>>,
    pub terminated: Mutex<Vec<String>>,
    pub deleted: Mutex<Vec<String>>,
}

impl ScriptedJobRunner {
    pub fn new() -> Self {
        Self {
            scripts: HashMap::new(),
            default_report: r#"{"vulnerabilities": []}"#.to_string(),
            jobs: Mutex::new(HashMap::new()),
            launched: Mutex::new(Vec::new()),
            terminated: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
        }
    }

    pub fn with_script(mut self, image: &str, script: JobScript) -> Self {
        self.scripts.insert(image.to_string(), script);
        self
    }

    pub fn launched_images(&self) -> Vec<String> {
        self.launched
            .lock()
            .unwrap()
            .iter()
            .map(|spec| spec.image.full_name())
            .collect()
    }

    pub fn deleted_jobs(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn terminated_jobs(&self) -> Vec<String> {
        self.terminated.lock().unwrap().clone()
    }
}

impl Default for ScriptedJobRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobRunner for ScriptedJobRunner {
    async fn launch(&self, spec: &ScanJobSpec, _cancel: &CancellationToken) -> Result<JobHandle> {
        let script = self
            .scripts
            .get(&spec.image.full_name())
            .cloned()
            .unwrap_or_else(|| JobScript::Succeed(self.default_report.clone()));
        if matches!(script, JobScript::LaunchError) {
            anyhow::bail!("Mock job runner failure: quota exceeded");
        }

        self.launched.lock().unwrap().push(spec.clone());
        self.jobs
            .lock()
            .unwrap()
            .insert(spec.job_name.clone(), script);
        Ok(JobHandle {
            job_name: spec.job_name.clone(),
            execution: format!("{}-exec", spec.job_name),
        })
    }

    async fn poll(&self, job: &JobHandle) -> Result<JobStatus> {
        let script = self.jobs.lock().unwrap().get(&job.job_name).cloned();
        Ok(match script {
            Some(JobScript::Succeed(_)) => JobStatus::Succeeded {
                output: OutputLocation(job.job_name.clone()),
            },
            Some(JobScript::Fail(code)) => JobStatus::Failed {
                exit_code: Some(code),
                detail: format!("scanner exited with code {}", code),
            },
            _ => JobStatus::Running,
        })
    }

    async fn read_output(&self, output: &OutputLocation) -> Result<String> {
        match self.jobs.lock().unwrap().get(&output.0) {
            Some(JobScript::Succeed(report)) => Ok(report.clone()),
            _ => anyhow::bail!("Mock job runner has no output for {}", output),
        }
    }

    async fn terminate(&self, job: &JobHandle) -> Result<()> {
        self.terminated.lock().unwrap().push(job.job_name.clone());
        Ok(())
    }

    async fn delete(&self, job: &JobHandle) -> Result<()> {
        self.deleted.lock().unwrap().push(job.job_name.clone());
        Ok(())
    }
}
