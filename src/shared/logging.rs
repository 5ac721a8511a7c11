//! Structured logging setup.
//!
//! Cloud Run forwards stdout/stderr to Cloud Logging, which parses one JSON
//! object per line, so production runs use the JSON layer.

use std::str::FromStr;
use std::sync::Once;
use tracing::Span;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line (for Cloud Logging).
    #[default]
    Json,
    /// Human-readable multi-line output (for local runs).
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" | "text" => Ok(LogFormat::Pretty),
            _ => Err(format!(
                "Invalid log format: {}. Please specify 'json' or 'pretty'",
                s
            )),
        }
    }
}

/// Initializes the logging subsystem.
///
/// Safe to call more than once; only the first call installs a subscriber.
/// `RUST_LOG` controls levels and defaults to `info`. Logs go to stderr so
/// that stdout stays free for command output.
pub fn init_logging(format: LogFormat) {
    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        let result = match format {
            LogFormat::Json => tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .try_init(),
            LogFormat::Pretty => tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty().with_writer(std::io::stderr))
                .try_init(),
        };

        if let Err(e) = result {
            eprintln!("⚠️  Warning: logging already initialized: {}", e);
        }
    });
}

/// Span covering the processing of one deployment event.
#[must_use]
pub fn event_span(event_id: &str, service: &str) -> Span {
    tracing::info_span!("deployment_event", event_id = event_id, service = service)
}

/// Span covering the pipeline of one image within an event.
#[must_use]
pub fn image_span(image: &str) -> Span {
    tracing::info_span!("image_scan", image = image)
}
