use figment::{
    providers::{Env, Serialized},
    Figment,
};
use serde::Serialize;
use std::path::{Path, PathBuf};

use super::{
    types::{SeriesConfig, Settings},
    ConfigError,
};

/// Environment prefix for daemon settings (`MANGASYNC_SERVER_URL`, ...).
const ENV_PREFIX: &str = "MANGASYNC_";

/// Load the series list from a YAML file.
pub fn load_series(path: &Path) -> Result<Vec<SeriesConfig>, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    let contents = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::ParseError(format!("{}: {}", path.display(), e)))?;

    load_series_from_str(&contents)
}

/// Load the series list from a YAML string (useful for testing)
pub fn load_series_from_str(yaml: &str) -> Result<Vec<SeriesConfig>, ConfigError> {
    // An empty document means "nothing to track", not a parse error.
    if yaml.trim().is_empty() {
        return Ok(Vec::new());
    }

    serde_yaml::from_str(yaml).map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Settings given explicitly on the command line.
///
/// Only fields that are `Some` (or `true`) take part in the merge, so flags
/// left out fall back to the environment and then to the defaults.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SettingsOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub library_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval_secs: Option<u64>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub wait_for_server: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub log_json: bool,
}

/// Load daemon settings: defaults, then `MANGASYNC_*` environment variables,
/// then command-line overrides.
pub fn load_settings(overrides: &SettingsOverrides) -> Result<Settings, ConfigError> {
    Figment::new()
        .merge(Serialized::defaults(Settings::default()))
        .merge(Env::prefixed(ENV_PREFIX))
        .merge(Serialized::defaults(overrides))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}
