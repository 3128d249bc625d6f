mod groups;
mod loader;
mod types;
mod validate;

pub use groups::{group_by_source, SourceGroups};
pub use loader::{load_series, load_series_from_str, load_settings, SettingsOverrides};
pub use types::*;
pub use validate::{validate_series, validate_settings};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
