use clap::{Parser, Subcommand};
use cloudrun_scan_trigger::shared::logging::LogFormat;
use std::path::PathBuf;

/// Scan container images of Cloud Run deployments with ephemeral qscanner jobs
#[derive(Parser, Debug)]
#[command(name = "cloudrun-scan-trigger")]
#[command(version)]
#[command(
    about = "Scan container images of Cloud Run deployments with ephemeral qscanner jobs",
    long_about = None
)]
pub struct Args {
    /// Path to a YAML config file (defaults to ./scan-trigger.config.yml when present)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log format: json or pretty (overrides LOG_FORMAT)
    #[arg(long, global = true, value_name = "FORMAT")]
    pub log_format: Option<LogFormat>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Process one deployment event envelope and exit
    HandleEvent {
        /// Envelope file, or '-' for stdin
        #[arg(short, long, default_value = "-", value_name = "FILE")]
        event: String,
    },

    /// Serve the Pub/Sub push endpoint
    Serve {
        /// Listen address (defaults to 0.0.0.0:$PORT, or 0.0.0.0:8080)
        #[arg(short, long, value_name = "ADDR")]
        listen: Option<String>,
    },

    /// Validate the configuration and print the resolved settings
    CheckConfig,
}

impl Args {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_event_defaults_to_stdin() {
        let args = Args::try_parse_from(["cloudrun-scan-trigger", "handle-event"]).unwrap();
        match args.command {
            Command::HandleEvent { event } => assert_eq!(event, "-"),
            other => panic!("unexpected command {:?}", other),
        }
        assert!(args.config.is_none());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = Args::try_parse_from([
            "cloudrun-scan-trigger",
            "serve",
            "--listen",
            "127.0.0.1:9000",
            "--config",
            "scan.yml",
            "--log-format",
            "pretty",
        ])
        .unwrap();
        assert!(matches!(args.command, Command::Serve { listen: Some(ref addr) } if addr == "127.0.0.1:9000"));
        assert_eq!(args.config, Some(PathBuf::from("scan.yml")));
        assert_eq!(args.log_format, Some(LogFormat::Pretty));
    }

    #[test]
    fn test_invalid_log_format_is_rejected() {
        let result = Args::try_parse_from(["cloudrun-scan-trigger", "--log-format", "xml", "check-config"]);
        let error = result.unwrap_err().to_string();
        assert!(error.contains("Invalid log format"));
    }

    #[test]
    fn test_subcommand_is_required() {
        assert!(Args::try_parse_from(["cloudrun-scan-trigger"]).is_err());
    }
}
