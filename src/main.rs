mod cli;

use anyhow::Context;
use cli::{Args, Command};
use cloudrun_scan_trigger::adapters::inbound::{push_router, serve_push_endpoint};
use cloudrun_scan_trigger::application::factories::AdapterFactory;
use cloudrun_scan_trigger::config::{discover_config, load_config_from_path, Backend, ScanConfig};
use cloudrun_scan_trigger::ports::inbound::DeploymentEventPort;
use cloudrun_scan_trigger::scan_orchestration::services::MAX_ENVELOPE_BYTES;
use cloudrun_scan_trigger::shared::error::{ExitCode, ScanTriggerError};
use cloudrun_scan_trigger::shared::logging::init_logging;
use cloudrun_scan_trigger::shared::security::read_regular_file;
use cloudrun_scan_trigger::shared::Result;
use std::io::Read;
use std::path::Path;
use std::process;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const DEFAULT_PORT: &str = "8080";

fn main() {
    let args = Args::parse_args();

    let code = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime.block_on(run(args)),
        Err(e) => {
            report(&anyhow::Error::new(e).context("Failed to start the async runtime"));
            ExitCode::InvocationAborted
        }
    };

    process::exit(code.as_i32());
}

async fn run(args: Args) -> ExitCode {
    let config = match load_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            report(&e);
            return ExitCode::for_error(&e);
        }
    };

    init_logging(args.log_format.unwrap_or(config.log_format));
    for warning in &config.warnings {
        tracing::warn!("{}", warning);
    }

    let shutdown = CancellationToken::new();
    tokio::spawn(cancel_on_signal(shutdown.clone()));

    let result = match args.command {
        Command::HandleEvent { event } => handle_event(&config, &event, shutdown).await,
        Command::Serve { listen } => serve(&config, listen, shutdown).await,
        Command::CheckConfig => {
            print_config(&config);
            Ok(ExitCode::Success)
        }
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            report(&e);
            ExitCode::for_error(&e)
        }
    }
}

/// Explicit `--config` path, else `./scan-trigger.config.yml` when present, else defaults.
fn load_config(explicit: Option<&Path>) -> Result<ScanConfig> {
    let file = match explicit {
        Some(path) => load_config_from_path(path).map_err(|e| {
            ScanTriggerError::configuration(
                "config",
                format!("{:#}", e),
                "Check the path given with --config",
            )
        })?,
        None => {
            let cwd = std::env::current_dir().context("Failed to read current directory")?;
            discover_config(&cwd)
                .map_err(|e| {
                    ScanTriggerError::configuration(
                        "config",
                        format!("{:#}", e),
                        "Fix or remove the config file in the working directory",
                    )
                })?
                .unwrap_or_default()
        }
    };
    ScanConfig::resolve(file, |name| std::env::var(name).ok())
}

async fn handle_event(
    config: &ScanConfig,
    source: &str,
    shutdown: CancellationToken,
) -> Result<ExitCode> {
    let raw = match read_envelope(source) {
        Ok(raw) => raw,
        Err(e) => {
            report(&e);
            return Ok(ExitCode::InvalidArguments);
        }
    };

    let pipeline = AdapterFactory::build_pipeline(config).await?;
    let summary = pipeline.handle_event(&raw, shutdown).await?;

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(ExitCode::Success)
}

/// Reads the envelope from a file or stdin (`-`).
///
/// Input is capped just above the decoder limit so that oversized envelopes
/// still reach the decoder and are rejected as malformed.
fn read_envelope(source: &str) -> Result<Vec<u8>> {
    let limit = MAX_ENVELOPE_BYTES as u64 + 1;
    if source == "-" {
        let mut raw = Vec::new();
        std::io::stdin()
            .lock()
            .take(limit)
            .read_to_end(&mut raw)
            .context("Failed to read event from stdin")?;
        return Ok(raw);
    }

    let path = Path::new(source);
    match read_regular_file(path, limit)? {
        Some(raw) => Ok(raw),
        None => anyhow::bail!("Event file not found: {}", path.display()),
    }
}

async fn serve(
    config: &ScanConfig,
    listen: Option<String>,
    shutdown: CancellationToken,
) -> Result<ExitCode> {
    let address = listen_address(listen, std::env::var("PORT").ok());
    let pipeline = AdapterFactory::build_pipeline(config).await?;
    let port: Arc<dyn DeploymentEventPort> = Arc::new(pipeline);

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    tracing::info!(
        address = %address,
        backend = %config.backend,
        project = %config.project_id,
        "push endpoint listening"
    );

    let router = push_router(port, shutdown.clone());
    serve_push_endpoint(listener, router, shutdown).await?;
    Ok(ExitCode::Success)
}

fn listen_address(listen: Option<String>, port: Option<String>) -> String {
    listen.unwrap_or_else(|| {
        let port = port
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_PORT.to_string());
        format!("0.0.0.0:{}", port.trim())
    })
}

fn print_config(config: &ScanConfig) {
    println!("✅ Configuration is valid\n");
    println!("  backend:              {}", config.backend);
    println!("  project:              {} ({})", config.project_id, config.region);
    println!("  pod endpoint:         {}", config.pod_endpoint);
    println!("  scanner image:        {}", config.scanner_image);
    println!("  access token:         {}", config.access_token);
    println!("  scan timeout:         {}s", config.scan_timeout.as_secs());
    println!("  poll interval:        {}s", config.poll_interval.as_secs());
    println!("  cache window:         {}h", config.cache_hours);
    println!("  cache tag references: {}", config.cache_tag_references);
    println!("  alert threshold:      {}", config.alert_threshold);
    println!("  max concurrent scans: {}", config.max_concurrent_scans);
    println!(
        "  invocation timeout:   {}s (cleanup reserve {}s)",
        config.invocation_timeout.as_secs(),
        config.cleanup_reserve.as_secs()
    );
    if let Some(bucket) = &config.results_bucket {
        println!("  results bucket:       {}", bucket);
    }
    if let Some(topic) = &config.notification_topic {
        println!("  alert topic:          {}", topic);
    }
    if let Some(account) = &config.job_service_account {
        println!("  job service account:  {}", account);
    }
    if config.backend == Backend::Local {
        println!("  results dir:          {}", config.local.results_dir.display());
        println!("  scanner binary:       {}", config.local.scanner_binary);
    }
    for warning in &config.warnings {
        println!("\n⚠️  {}", warning);
    }
}

/// Cancels `token` on Ctrl-C or SIGTERM (sent by Cloud Run before shutdown).
async fn cancel_on_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    tracing::warn!("shutdown signal received, cancelling in-flight scans");
    token.cancel();
}

fn report(error: &anyhow::Error) {
    eprintln!("\n❌ An error occurred:\n");
    eprintln!("{}", error);

    // Display error chain
    for cause in error.chain().skip(1) {
        eprintln!("\nCaused by: {}", cause);
    }

    eprintln!();
}
