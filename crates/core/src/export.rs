//! Series-level files in the reader's local library layout.
//!
//! Each series directory gets a `details.json` (rewritten every run) and a
//! `cover.jpg` (written once, never replaced).

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;
use tokio::fs;
use tracing::debug;

use crate::remote::RemoteError;
use crate::resolver::SeriesHandle;

/// Metadata filename read by the reader.
pub const DETAILS_FILE: &str = "details.json";

/// Cover filename read by the reader. The extension is fixed whatever the
/// actual image type is.
pub const COVER_FILE: &str = "cover.jpg";

/// Legend of the status codes, written alongside them.
pub const STATUS_LEGEND: [&str; 4] = [
    "0 = Unknown",
    "1 = Ongoing",
    "2 = Completed",
    "3 = Licensed",
];

/// Errors that can occur while exporting series files.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize details: {0}")]
    Json(#[from] serde_json::Error),

    #[error("cover task failed: {0}")]
    Task(String),
}

/// Reader status code for a remote status string.
///
/// Total: anything unrecognised (including the empty string) is Unknown.
pub fn status_code(status: &str) -> u8 {
    match status {
        "ONGOING" => 1,
        "COMPLETED" => 2,
        "LICENSED" => 3,
        _ => 0,
    }
}

/// `details.json` schema of the reader's local source. Empty fields are
/// left out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalDetails {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub author: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub artist: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub genre: Vec<String>,
    /// Status code as a string ("0".."3"), as the reader expects.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub status: String,
    #[serde(default, rename = "_status values", skip_serializing_if = "Vec::is_empty")]
    pub status_values: Vec<String>,
}

impl LocalDetails {
    pub fn from_handle(handle: &SeriesHandle) -> Self {
        let remote = &handle.remote;
        Self {
            title: handle.title.clone(),
            author: remote.author.clone().unwrap_or_default(),
            artist: remote.artist.clone().unwrap_or_default(),
            description: remote.description.clone().unwrap_or_default(),
            genre: remote.genres.clone().unwrap_or_default(),
            status: status_code(remote.status.as_deref().unwrap_or_default()).to_string(),
            status_values: STATUS_LEGEND.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Write `details.json`, replacing any previous version.
pub async fn export_metadata(handle: &SeriesHandle, dir: &Path) -> Result<(), ExportError> {
    let details = LocalDetails::from_handle(handle);
    let json = serde_json::to_vec(&details)?;

    let path = dir.join(DETAILS_FILE);
    fs::write(&path, json)
        .await
        .map_err(|e| ExportError::Io { path, source: e })?;

    debug!(title = %handle.title, "Wrote series details");
    Ok(())
}

/// Write `cover.jpg` unless one already exists.
///
/// Returns whether a cover was written.
pub async fn export_cover(handle: &SeriesHandle, dir: &Path) -> Result<bool, ExportError> {
    let path = dir.join(COVER_FILE);

    let exists = fs::try_exists(&path).await.map_err(|e| ExportError::Io {
        path: path.clone(),
        source: e,
    })?;
    if exists {
        return Ok(false);
    }

    let image = handle.client.thumbnail(handle.id()).await?;
    let mime = image.mime;

    let staging_dir = dir.to_path_buf();
    let target = path.clone();
    let written =
        tokio::task::spawn_blocking(move || write_new_file(&staging_dir, &target, &image.bytes))
            .await
            .map_err(|e| ExportError::Task(e.to_string()))??;

    if written {
        debug!(title = %handle.title, mime = %mime, "Wrote series cover");
    }
    Ok(written)
}

/// Write `bytes` to `path` through a hidden temporary file in `dir`.
///
/// `path` either stays absent or holds the complete content. Returns
/// `false` when `path` appeared meanwhile; it is never replaced.
fn write_new_file(dir: &Path, path: &Path, bytes: &[u8]) -> Result<bool, ExportError> {
    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source: std::io::Error| ExportError::Io { path, source }
    };

    let mut partial = NamedTempFile::new_in(dir).map_err(io_err(dir))?;
    partial.write_all(bytes).map_err(io_err(partial.path()))?;
    partial.as_file().sync_all().map_err(io_err(partial.path()))?;

    match partial.persist_noclobber(path) {
        Ok(_) => Ok(true),
        Err(e) if e.error.kind() == ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(ExportError::Io {
            path: path.to_path_buf(),
            source: e.error,
        }),
    }
}
