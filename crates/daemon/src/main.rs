use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mangasync_core::{
    group_by_source, load_series, load_settings, validate_series, validate_settings,
    wait_until_ready, Orchestrator, RemoteApi, Settings, SettingsOverrides, SuwayomiClient,
};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Mirror series tracked by a Suwayomi server into a local reader library.
///
/// Every flag can also be set through a `MANGASYNC_*` environment variable
/// (`MANGASYNC_SERVER_URL`, `MANGASYNC_CONFIG_PATH`, ...); flags win.
#[derive(Debug, Parser)]
#[command(name = "mangasync", version, about)]
struct Args {
    /// Server endpoint (e.g. http://localhost:4567/)
    #[arg(long)]
    url: Option<String>,

    /// Series list (YAML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Library root; one directory per series is created under it
    #[arg(long)]
    library: Option<PathBuf>,

    /// Seconds between runs (0 to run once)
    #[arg(long)]
    interval: Option<u64>,

    /// Wait for the server to be running before the first run
    #[arg(long = "wait-for-it")]
    wait_for_it: bool,

    /// Log as JSON lines
    #[arg(long)]
    log_json: bool,
}

impl Args {
    fn overrides(&self) -> SettingsOverrides {
        SettingsOverrides {
            server_url: self.url.clone(),
            config_path: self.config.clone(),
            library_dir: self.library.clone(),
            interval_secs: self.interval,
            wait_for_server: self.wait_for_it,
            log_json: self.log_json,
        }
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let settings = match load_settings(&args.overrides()) {
        Ok(settings) => settings,
        Err(e) => {
            init_logging(args.log_json);
            error!("Fatal error: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(settings.log_json);

    if let Err(e) = run(settings).await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_logging(json: bool) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .init();
}

async fn run(settings: Settings) -> Result<()> {
    info!("mangasync {} starting", VERSION);

    validate_settings(&settings).context("Invalid settings")?;

    // Load configuration
    info!("Loading series from {:?}", settings.config_path);
    let series = load_series(&settings.config_path)
        .with_context(|| format!("Failed to load series from {:?}", settings.config_path))?;
    validate_series(&series).context("Series configuration validation failed")?;

    let groups = group_by_source(&series);
    info!(
        "Tracking {} series across {} sources",
        groups.series_count(),
        groups.len()
    );

    let client = SuwayomiClient::new(
        &settings.server_url,
        settings.request_timeout_secs.map(Duration::from_secs),
    )
    .context("Failed to create server client")?;
    let remote: Arc<dyn RemoteApi> = Arc::new(client);

    if settings.wait_for_server {
        info!("Waiting for server at {}", settings.server_url);
        wait_until_ready(remote.as_ref(), Duration::from_millis(settings.ready_poll_ms)).await;
        info!("Server is running");
    }

    let orchestrator = Orchestrator::new(remote, &settings.library_dir);

    if settings.interval_secs == 0 {
        orchestrator.run(&groups).await;
        return Ok(());
    }

    let interval = Duration::from_secs(settings.interval_secs);
    loop {
        orchestrator.run(&groups).await;

        info!("Next run in {:?}", interval);
        tokio::select! {
            _ = tokio::time::sleep(interval) => {},
            _ = shutdown_signal() => {
                info!("Shutdown requested, exiting");
                break;
            }
        }
    }

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parse_all_flags() {
        let args = Args::try_parse_from([
            "mangasync",
            "--url",
            "http://localhost:4567/",
            "--config",
            "series.yaml",
            "--library",
            "/library",
            "--interval",
            "3600",
            "--wait-for-it",
        ])
        .unwrap();

        let overrides = args.overrides();
        assert_eq!(overrides.server_url.as_deref(), Some("http://localhost:4567/"));
        assert_eq!(overrides.config_path, Some(PathBuf::from("series.yaml")));
        assert_eq!(overrides.library_dir, Some(PathBuf::from("/library")));
        assert_eq!(overrides.interval_secs, Some(3600));
        assert!(overrides.wait_for_server);
        assert!(!overrides.log_json);
    }

    #[test]
    fn test_args_defaults_leave_settings_untouched() {
        let args = Args::try_parse_from(["mangasync"]).unwrap();
        let overrides = args.overrides();
        assert!(overrides.server_url.is_none());
        assert!(overrides.interval_secs.is_none());
        assert!(!overrides.wait_for_server);
    }

    #[test]
    fn test_args_reject_bad_interval() {
        assert!(Args::try_parse_from(["mangasync", "--interval", "1h"]).is_err());
    }
}
