use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One tracked series, as listed in the series configuration file.
///
/// Unknown keys are rejected so that typos (`pkgname`, `sourceId`) fail at
/// startup instead of silently producing a half-configured entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SeriesConfig {
    /// Display title; also the name of the series directory in the library.
    pub title: String,
    /// Series URL as understood by the remote source.
    pub url: String,
    /// Remote source id.
    #[serde(rename = "source")]
    pub source_id: i64,
    /// Extension package providing the source.
    #[serde(rename = "pkgName")]
    pub extension_package: String,
}

/// Daemon settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    /// Base URL of the remote server (e.g. "http://localhost:4567/").
    #[serde(default)]
    pub server_url: String,
    /// Path of the YAML series list.
    #[serde(default = "default_series_config")]
    pub config_path: PathBuf,
    /// Root of the local reader library.
    #[serde(default = "default_library_dir")]
    pub library_dir: PathBuf,
    /// Seconds between runs (0 = run once and exit).
    #[serde(default)]
    pub interval_secs: u64,
    /// Block until the server answers its health endpoint before the first run.
    #[serde(default)]
    pub wait_for_server: bool,
    /// Delay between readiness probes (milliseconds).
    #[serde(default = "default_ready_poll_ms")]
    pub ready_poll_ms: u64,
    /// Per-request timeout in seconds. None keeps the transport default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
    /// Emit logs as JSON lines.
    #[serde(default)]
    pub log_json: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: String::new(),
            config_path: default_series_config(),
            library_dir: default_library_dir(),
            interval_secs: 0,
            wait_for_server: false,
            ready_poll_ms: default_ready_poll_ms(),
            request_timeout_secs: None,
            log_json: false,
        }
    }
}

fn default_series_config() -> PathBuf {
    PathBuf::from("config.yaml")
}

fn default_library_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_ready_poll_ms() -> u64 {
    1000
}
