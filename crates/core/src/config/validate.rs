use std::collections::HashSet;

use super::{
    types::{SeriesConfig, Settings},
    ConfigError,
};

/// Validate the series list.
/// Currently validates:
/// - title and url are not empty
/// - title is usable as a single directory name
/// - titles are unique (each series owns its directory)
pub fn validate_series(series: &[SeriesConfig]) -> Result<(), ConfigError> {
    let mut titles = HashSet::new();

    for entry in series {
        if entry.title.trim().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "series with url '{}' has an empty title",
                entry.url
            )));
        }
        if entry.url.is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "series '{}' has an empty url",
                entry.title
            )));
        }
        if entry.title == "."
            || entry.title == ".."
            || entry.title.contains(['/', '\\'])
        {
            return Err(ConfigError::ValidationError(format!(
                "series title '{}' is not a valid directory name",
                entry.title
            )));
        }
        if !titles.insert(entry.title.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "series title '{}' is used more than once",
                entry.title
            )));
        }
    }

    Ok(())
}

/// Validate daemon settings.
pub fn validate_settings(settings: &Settings) -> Result<(), ConfigError> {
    if settings.server_url.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "server url is required".to_string(),
        ));
    }
    if !settings.server_url.starts_with("http://") && !settings.server_url.starts_with("https://")
    {
        return Err(ConfigError::ValidationError(format!(
            "server url '{}' must start with http:// or https://",
            settings.server_url
        )));
    }

    Ok(())
}
