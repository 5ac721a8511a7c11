//! Configuration for cloudrun-scan-trigger.
//!
//! Settings come from an optional YAML file (`scan-trigger.config.yml` or
//! `--config`), overlaid by environment variables, and are resolved once at
//! startup into a validated [`ScanConfig`]. Environment variables win over
//! the file; both win over defaults.

use anyhow::Context;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::application::dto::PipelineSettings;
use crate::scan_orchestration::domain::{AccessTokenSource, AlertThreshold, SCANNER_TOKEN_ENV};
use crate::shared::error::ScanTriggerError;
use crate::shared::logging::LogFormat;
use crate::shared::Result;

pub const CONFIG_FILENAME: &str = "scan-trigger.config.yml";

const DEFAULT_REGION: &str = "us-central1";
const DEFAULT_SCANNER_IMAGE: &str = "qualys/qscanner:latest";
const DEFAULT_SCAN_TIMEOUT_SECS: u64 = 1800;
const DEFAULT_CACHE_HOURS: u32 = 24;
const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;
const DEFAULT_MAX_CONCURRENT_SCANS: usize = 2;
const MAX_CONCURRENT_SCANS_LIMIT: usize = 16;
const DEFAULT_INVOCATION_TIMEOUT_SECS: u64 = 3600;
const DEFAULT_CLEANUP_RESERVE_SECS: u64 = 60;
const DEFAULT_RESULTS_DIR: &str = "./scan-results";
const DEFAULT_SCANNER_BINARY: &str = "qscanner";

/// Top-level configuration file schema.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    pub project_id: Option<String>,
    pub region: Option<String>,
    pub results_bucket: Option<String>,
    pub pod_endpoint: Option<String>,
    pub scanner_image: Option<String>,
    pub scan_timeout_seconds: Option<u64>,
    pub cache_hours: Option<u32>,
    pub alert_threshold: Option<String>,
    pub job_service_account: Option<String>,
    pub notification_topic: Option<String>,
    pub access_token_secret: Option<String>,
    pub access_token_env: Option<String>,
    pub poll_interval_seconds: Option<u64>,
    pub max_concurrent_scans: Option<usize>,
    pub invocation_timeout_seconds: Option<u64>,
    pub cleanup_reserve_seconds: Option<u64>,
    pub cache_tag_references: Option<bool>,
    pub backend: Option<String>,
    pub local: Option<LocalConfigFile>,
    pub log_format: Option<String>,
    /// Captures unknown fields for warnings.
    #[serde(flatten)]
    pub unknown_fields: HashMap<String, serde_yaml_ng::Value>,
}

/// Settings of the `local` backend.
#[derive(Debug, Deserialize, Default)]
pub struct LocalConfigFile {
    pub results_dir: Option<PathBuf>,
    pub scanner_binary: Option<String>,
    /// Arguments placed before the scanner arguments (e.g. `docker run ... image`)
    pub scanner_args: Option<Vec<String>>,
    #[serde(flatten)]
    pub unknown_fields: HashMap<String, serde_yaml_ng::Value>,
}

impl ConfigFile {
    /// Unknown keys, with nested keys as `local.<key>`
    pub fn unknown_field_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.unknown_fields.keys().cloned().collect();
        if let Some(local) = &self.local {
            names.extend(local.unknown_fields.keys().map(|k| format!("local.{}", k)));
        }
        names.sort();
        names
    }
}

/// Load config from an explicit path. Returns an error if the file is not found.
pub fn load_config_from_path(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path).with_context(|| {
        format!(
            "Failed to read config file: {}\n\n💡 Hint: Check that the file exists and is readable.",
            path.display()
        )
    })?;

    let config: ConfigFile = serde_yaml_ng::from_str(&content).with_context(|| {
        format!(
            "Failed to parse config file: {}\n\n💡 Hint: Ensure the file contains valid YAML syntax.",
            path.display()
        )
    })?;

    Ok(config)
}

/// Auto-discover config in a directory. Returns `None` silently if not found.
pub fn discover_config(dir: &Path) -> Result<Option<ConfigFile>> {
    let config_path = dir.join(CONFIG_FILENAME);

    if !config_path.exists() {
        return Ok(None);
    }

    let config = load_config_from_path(&config_path)?;
    Ok(Some(config))
}

/// Where scan jobs run and results are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Cloud Run Jobs, Cloud Storage, Firestore and Pub/Sub
    Gcp,
    /// Local scanner subprocess and filesystem storage
    Local,
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gcp" => Ok(Backend::Gcp),
            "local" => Ok(Backend::Local),
            _ => Err(format!("Invalid backend: {}. Please specify 'gcp' or 'local'", s)),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Gcp => write!(f, "gcp"),
            Backend::Local => write!(f, "local"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalSettings {
    pub results_dir: PathBuf,
    pub scanner_binary: String,
    pub scanner_args: Vec<String>,
}

/// Validated configuration, built once at startup.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub project_id: String,
    pub region: String,
    pub results_bucket: Option<String>,
    pub pod_endpoint: String,
    pub scanner_image: String,
    pub scan_timeout: Duration,
    pub cache_hours: u32,
    pub alert_threshold: AlertThreshold,
    pub job_service_account: Option<String>,
    pub notification_topic: Option<String>,
    pub access_token: AccessTokenSource,
    pub poll_interval: Duration,
    pub max_concurrent_scans: usize,
    pub invocation_timeout: Duration,
    pub cleanup_reserve: Duration,
    pub cache_tag_references: bool,
    pub backend: Backend,
    pub local: LocalSettings,
    pub log_format: LogFormat,
    /// Non-fatal findings (unknown keys) to log once logging is up.
    pub warnings: Vec<String>,
}

impl ScanConfig {
    /// Resolves file values and environment overrides into a validated config
    ///
    /// # Arguments
    /// * `file` - Parsed config file (use `ConfigFile::default()` when absent)
    /// * `env` - Environment lookup, `|name| std::env::var(name).ok()` in production
    ///
    /// # Errors
    /// Returns a `Configuration` error naming the first invalid setting
    pub fn resolve<F>(file: ConfigFile, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = Lookup { env: &env };
        let warnings = file
            .unknown_field_names()
            .into_iter()
            .map(|key| format!("Unknown config field '{}' will be ignored", key))
            .collect();

        let backend = match lookup.string("SCAN_BACKEND", file.backend) {
            Some(raw) => Backend::from_str(&raw).map_err(|reason| {
                configuration("backend", reason, "Set SCAN_BACKEND to 'gcp' or 'local'")
            })?,
            None => Backend::Gcp,
        };

        let log_format = match lookup.string("LOG_FORMAT", file.log_format) {
            Some(raw) => LogFormat::from_str(&raw).map_err(|reason| {
                configuration("log_format", reason, "Set LOG_FORMAT to 'json' or 'pretty'")
            })?,
            None => LogFormat::default(),
        };

        let project_id = lookup.string("GCP_PROJECT_ID", file.project_id).ok_or_else(|| {
            configuration(
                "project_id",
                "no project id configured",
                "Set GCP_PROJECT_ID or 'project_id' in the config file",
            )
        })?;

        let pod_endpoint = lookup.string("QUALYS_POD", file.pod_endpoint).ok_or_else(|| {
            configuration(
                "pod_endpoint",
                "no scanner POD endpoint configured",
                "Set QUALYS_POD (e.g. US2, EU1) or 'pod_endpoint' in the config file",
            )
        })?;

        let results_bucket = lookup.string("SCAN_RESULTS_BUCKET", file.results_bucket);
        if backend == Backend::Gcp && results_bucket.is_none() {
            return Err(configuration(
                "results_bucket",
                "no results bucket configured for the gcp backend",
                "Set SCAN_RESULTS_BUCKET or 'results_bucket' in the config file",
            ));
        }

        let access_token = match backend {
            Backend::Gcp => {
                let secret = lookup
                    .string("QUALYS_TOKEN_SECRET", file.access_token_secret)
                    .ok_or_else(|| {
                        configuration(
                            "access_token_secret",
                            "no Secret Manager secret configured for the scanner token",
                            "Set QUALYS_TOKEN_SECRET to a secret id or projects/<p>/secrets/<s>[/versions/<v>]",
                        )
                    })?;
                parse_secret_reference(&secret)
            }
            Backend::Local => AccessTokenSource::Environment {
                variable: lookup
                    .string("QUALYS_TOKEN_ENV", file.access_token_env)
                    .unwrap_or_else(|| SCANNER_TOKEN_ENV.to_string()),
            },
        };

        let alert_threshold = match lookup.string("NOTIFY_SEVERITY_THRESHOLD", file.alert_threshold) {
            Some(raw) => AlertThreshold::from_str(&raw).map_err(|reason| {
                configuration(
                    "alert_threshold",
                    reason,
                    "Set NOTIFY_SEVERITY_THRESHOLD to CRITICAL or HIGH",
                )
            })?,
            None => AlertThreshold::High,
        };

        let scan_timeout_secs = lookup.number(
            "SCAN_TIMEOUT",
            "scan_timeout_seconds",
            file.scan_timeout_seconds,
            DEFAULT_SCAN_TIMEOUT_SECS,
        )?;
        let poll_interval_secs = lookup.number(
            "SCAN_POLL_INTERVAL",
            "poll_interval_seconds",
            file.poll_interval_seconds,
            DEFAULT_POLL_INTERVAL_SECS,
        )?;
        let cache_hours = lookup.number(
            "SCAN_CACHE_HOURS",
            "cache_hours",
            file.cache_hours,
            DEFAULT_CACHE_HOURS,
        )?;
        let max_concurrent_scans = lookup.number(
            "MAX_CONCURRENT_SCANS",
            "max_concurrent_scans",
            file.max_concurrent_scans,
            DEFAULT_MAX_CONCURRENT_SCANS,
        )?;
        let invocation_timeout_secs = lookup.number(
            "INVOCATION_TIMEOUT",
            "invocation_timeout_seconds",
            file.invocation_timeout_seconds,
            DEFAULT_INVOCATION_TIMEOUT_SECS,
        )?;
        let cleanup_reserve_secs = lookup.number(
            "CLEANUP_RESERVE",
            "cleanup_reserve_seconds",
            file.cleanup_reserve_seconds,
            DEFAULT_CLEANUP_RESERVE_SECS,
        )?;
        let cache_tag_references = lookup.flag(
            "CACHE_TAG_REFERENCES",
            "cache_tag_references",
            file.cache_tag_references,
            true,
        )?;

        if scan_timeout_secs == 0 {
            return Err(configuration(
                "scan_timeout_seconds",
                "must be greater than zero",
                "The default is 1800 seconds",
            ));
        }
        if poll_interval_secs == 0 || poll_interval_secs > scan_timeout_secs {
            return Err(configuration(
                "poll_interval_seconds",
                format!(
                    "{} is outside 1..={} (the scan timeout)",
                    poll_interval_secs, scan_timeout_secs
                ),
                "The default is 10 seconds",
            ));
        }
        if max_concurrent_scans == 0 || max_concurrent_scans > MAX_CONCURRENT_SCANS_LIMIT {
            return Err(configuration(
                "max_concurrent_scans",
                format!(
                    "{} is outside 1..={}",
                    max_concurrent_scans, MAX_CONCURRENT_SCANS_LIMIT
                ),
                "Each concurrent scan is a separate Cloud Run job execution",
            ));
        }
        if cleanup_reserve_secs >= invocation_timeout_secs {
            return Err(configuration(
                "cleanup_reserve_seconds",
                format!(
                    "reserve of {}s leaves no time within the {}s invocation timeout",
                    cleanup_reserve_secs, invocation_timeout_secs
                ),
                "Keep CLEANUP_RESERVE well below INVOCATION_TIMEOUT",
            ));
        }

        let local_file = file.local.unwrap_or_default();
        let local = LocalSettings {
            results_dir: lookup
                .string("LOCAL_RESULTS_DIR", None)
                .map(PathBuf::from)
                .or(local_file.results_dir)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_RESULTS_DIR)),
            scanner_binary: lookup
                .string("QSCANNER_BINARY", local_file.scanner_binary)
                .unwrap_or_else(|| DEFAULT_SCANNER_BINARY.to_string()),
            scanner_args: local_file.scanner_args.unwrap_or_default(),
        };

        Ok(Self {
            project_id,
            region: lookup
                .string("GCP_REGION", file.region)
                .unwrap_or_else(|| DEFAULT_REGION.to_string()),
            results_bucket,
            pod_endpoint,
            scanner_image: lookup
                .string("QSCANNER_IMAGE", file.scanner_image)
                .unwrap_or_else(|| DEFAULT_SCANNER_IMAGE.to_string()),
            scan_timeout: Duration::from_secs(scan_timeout_secs),
            cache_hours,
            alert_threshold,
            job_service_account: lookup.string("CLOUDRUN_SERVICE_ACCOUNT", file.job_service_account),
            notification_topic: lookup.string("NOTIFICATION_TOPIC", file.notification_topic),
            access_token,
            poll_interval: Duration::from_secs(poll_interval_secs),
            max_concurrent_scans,
            invocation_timeout: Duration::from_secs(invocation_timeout_secs),
            cleanup_reserve: Duration::from_secs(cleanup_reserve_secs),
            cache_tag_references,
            backend,
            local,
            log_format,
            warnings,
        })
    }

    /// Settings handed to the event-processing use case
    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            scanner_image: self.scanner_image.clone(),
            pod_endpoint: self.pod_endpoint.clone(),
            access_token: self.access_token.clone(),
            job_service_account: self.job_service_account.clone(),
            scan_timeout: self.scan_timeout,
            poll_interval: self.poll_interval,
            cache_hours: self.cache_hours,
            cache_tag_references: self.cache_tag_references,
            alert_threshold: self.alert_threshold,
            max_concurrent_scans: self.max_concurrent_scans,
            invocation_timeout: self.invocation_timeout,
            cleanup_reserve: self.cleanup_reserve,
        }
    }
}

/// Environment-over-file lookup; blank values count as unset.
struct Lookup<'a, F> {
    env: &'a F,
}

impl<F> Lookup<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, name: &str, file_value: Option<String>) -> Option<String> {
        (self.env)(name)
            .or(file_value)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn number<T>(&self, name: &str, field: &str, file_value: Option<T>, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match (self.env)(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
            Some(raw) => raw.parse::<T>().map_err(|e| {
                configuration(
                    field,
                    format!("{}='{}' is not a valid number: {}", name, raw, e),
                    format!("Set {} to a non-negative integer", name),
                )
            }),
            None => Ok(file_value.unwrap_or(default)),
        }
    }

    fn flag(&self, name: &str, field: &str, file_value: Option<bool>, default: bool) -> Result<bool> {
        match (self.env)(name).map(|v| v.trim().to_lowercase()) {
            Some(raw) if raw.is_empty() => Ok(file_value.unwrap_or(default)),
            Some(raw) => match raw.as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                _ => Err(configuration(
                    field,
                    format!("{}='{}' is not a boolean", name, raw),
                    format!("Set {} to true or false", name),
                )),
            },
            None => Ok(file_value.unwrap_or(default)),
        }
    }
}

/// `projects/p/secrets/s/versions/v`, `projects/p/secrets/s` or a bare secret id
fn parse_secret_reference(raw: &str) -> AccessTokenSource {
    match raw.split_once("/versions/") {
        Some((secret, version)) if !version.is_empty() => AccessTokenSource::SecretVersion {
            secret: secret.to_string(),
            version: version.to_string(),
        },
        _ => AccessTokenSource::SecretVersion {
            secret: raw.trim_end_matches('/').to_string(),
            version: "latest".to_string(),
        },
    }
}

fn configuration(
    field: &str,
    reason: impl Into<String>,
    hint: impl Into<String>,
) -> anyhow::Error {
    ScanTriggerError::configuration(field, reason, hint).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    fn gcp_env() -> Vec<(&'static str, &'static str)> {
        vec![
            ("GCP_PROJECT_ID", "demo"),
            ("QUALYS_POD", "US2"),
            ("SCAN_RESULTS_BUCKET", "demo-scan-results"),
            ("QUALYS_TOKEN_SECRET", "qualys-token"),
        ]
    }

    fn config_error_field(err: &anyhow::Error) -> String {
        match err.downcast_ref::<ScanTriggerError>() {
            Some(ScanTriggerError::Configuration { field, .. }) => field.clone(),
            other => panic!("expected configuration error, got {:?}", other),
        }
    }

    #[test]
    fn test_defaults_from_minimal_env() {
        let config = ScanConfig::resolve(ConfigFile::default(), env(&gcp_env())).unwrap();

        assert_eq!(config.backend, Backend::Gcp);
        assert_eq!(config.region, "us-central1");
        assert_eq!(config.scanner_image, "qualys/qscanner:latest");
        assert_eq!(config.scan_timeout, Duration::from_secs(1800));
        assert_eq!(config.cache_hours, 24);
        assert_eq!(config.alert_threshold, AlertThreshold::High);
        assert_eq!(config.poll_interval, Duration::from_secs(10));
        assert_eq!(config.max_concurrent_scans, 2);
        assert!(config.cache_tag_references);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(
            config.access_token,
            AccessTokenSource::SecretVersion {
                secret: "qualys-token".to_string(),
                version: "latest".to_string()
            }
        );
    }

    #[test]
    fn test_invalid_threshold_is_configuration_error() {
        let mut vars = gcp_env();
        vars.push(("NOTIFY_SEVERITY_THRESHOLD", "MEDIUM"));
        let err = ScanConfig::resolve(ConfigFile::default(), env(&vars)).unwrap_err();
        assert_eq!(config_error_field(&err), "alert_threshold");
        assert!(err.to_string().contains("CRITICAL or HIGH"));
    }

    #[test]
    fn test_missing_pod_endpoint_is_configuration_error() {
        let vars: Vec<_> = gcp_env().into_iter().filter(|(k, _)| *k != "QUALYS_POD").collect();
        let err = ScanConfig::resolve(ConfigFile::default(), env(&vars)).unwrap_err();
        assert_eq!(config_error_field(&err), "pod_endpoint");
    }

    #[test]
    fn test_gcp_backend_requires_bucket_and_secret() {
        let vars: Vec<_> = gcp_env()
            .into_iter()
            .filter(|(k, _)| *k != "SCAN_RESULTS_BUCKET")
            .collect();
        let err = ScanConfig::resolve(ConfigFile::default(), env(&vars)).unwrap_err();
        assert_eq!(config_error_field(&err), "results_bucket");

        let vars: Vec<_> = gcp_env()
            .into_iter()
            .filter(|(k, _)| *k != "QUALYS_TOKEN_SECRET")
            .collect();
        let err = ScanConfig::resolve(ConfigFile::default(), env(&vars)).unwrap_err();
        assert_eq!(config_error_field(&err), "access_token_secret");
    }

    #[test]
    fn test_local_backend_needs_no_gcp_resources() {
        let config = ScanConfig::resolve(
            ConfigFile::default(),
            env(&[
                ("SCAN_BACKEND", "local"),
                ("GCP_PROJECT_ID", "demo"),
                ("QUALYS_POD", "EU1"),
                ("LOCAL_RESULTS_DIR", "/tmp/results"),
            ]),
        )
        .unwrap();

        assert_eq!(config.backend, Backend::Local);
        assert_eq!(config.local.results_dir, PathBuf::from("/tmp/results"));
        assert_eq!(config.local.scanner_binary, "qscanner");
        assert!(config.local.scanner_args.is_empty());
        assert_eq!(
            config.access_token,
            AccessTokenSource::Environment {
                variable: "QUALYS_ACCESS_TOKEN".to_string()
            }
        );
    }

    #[test]
    fn test_env_overrides_file() {
        let file = ConfigFile {
            scan_timeout_seconds: Some(600),
            cache_hours: Some(12),
            region: Some("europe-west1".to_string()),
            ..ConfigFile::default()
        };
        let mut vars = gcp_env();
        vars.push(("SCAN_CACHE_HOURS", "6"));
        let config = ScanConfig::resolve(file, env(&vars)).unwrap();

        assert_eq!(config.scan_timeout, Duration::from_secs(600));
        assert_eq!(config.cache_hours, 6);
        assert_eq!(config.region, "europe-west1");
    }

    #[test]
    fn test_non_numeric_env_is_rejected() {
        let mut vars = gcp_env();
        vars.push(("SCAN_TIMEOUT", "thirty minutes"));
        let err = ScanConfig::resolve(ConfigFile::default(), env(&vars)).unwrap_err();
        assert_eq!(config_error_field(&err), "scan_timeout_seconds");
    }

    #[test]
    fn test_bounds_are_validated() {
        for (name, value, field) in [
            ("SCAN_TIMEOUT", "0", "scan_timeout_seconds"),
            ("SCAN_POLL_INTERVAL", "0", "poll_interval_seconds"),
            ("MAX_CONCURRENT_SCANS", "0", "max_concurrent_scans"),
            ("MAX_CONCURRENT_SCANS", "64", "max_concurrent_scans"),
            ("CLEANUP_RESERVE", "3600", "cleanup_reserve_seconds"),
            ("CACHE_TAG_REFERENCES", "maybe", "cache_tag_references"),
        ] {
            let mut vars = gcp_env();
            vars.push((name, value));
            let err = ScanConfig::resolve(ConfigFile::default(), env(&vars)).unwrap_err();
            assert_eq!(config_error_field(&err), field, "{}={}", name, value);
        }
    }

    #[test]
    fn test_secret_reference_with_version() {
        assert_eq!(
            parse_secret_reference("projects/p/secrets/qualys/versions/3"),
            AccessTokenSource::SecretVersion {
                secret: "projects/p/secrets/qualys".to_string(),
                version: "3".to_string()
            }
        );
    }

    #[test]
    fn test_load_config_file_and_warn_unknown_fields() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("config.yml");
        fs::write(
            &config_path,
            r#"
project_id: demo
pod_endpoint: US3
backend: local
alert_threshold: critical
cache_tag_references: false
local:
  results_dir: ./out
  scanner: qscanner
colour: blue
"#,
        )
        .unwrap();

        let file = load_config_from_path(&config_path).unwrap();
        assert_eq!(file.unknown_field_names(), vec!["colour", "local.scanner"]);

        let config = ScanConfig::resolve(file, env(&[])).unwrap();
        assert_eq!(config.pod_endpoint, "US3");
        assert_eq!(config.alert_threshold, AlertThreshold::Critical);
        assert!(!config.cache_tag_references);
        assert_eq!(config.local.results_dir, PathBuf::from("./out"));
        assert_eq!(config.warnings.len(), 2);
    }

    #[test]
    fn test_discover_config() {
        let dir = TempDir::new().unwrap();
        assert!(discover_config(dir.path()).unwrap().is_none());

        fs::write(dir.path().join(CONFIG_FILENAME), "project_id: found\n").unwrap();
        let file = discover_config(dir.path()).unwrap().unwrap();
        assert_eq!(file.project_id.as_deref(), Some("found"));
    }

    #[test]
    fn test_invalid_yaml_is_error() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("config.yml");
        fs::write(&config_path, "project_id: [unclosed\n").unwrap();
        let err = load_config_from_path(&config_path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_pipeline_settings_mirror_config() {
        let config = ScanConfig::resolve(ConfigFile::default(), env(&gcp_env())).unwrap();
        let settings = config.pipeline_settings();
        assert_eq!(settings.pod_endpoint, "US2");
        assert_eq!(settings.wait_budget(), Duration::from_secs(3540));
    }
}
