//! Chapter synchronization.
//!
//! Local state is the filesystem: a chapter counts as downloaded when the
//! series directory holds an archive whose filename encodes its index.
//! Chapters are fetched page by page into a scratch directory and only
//! packaged once every page arrived; the scratch directory is removed on
//! every exit path. A chapter reporting no pages still gets an (empty)
//! archive so it is not fetched again.

mod archive;

pub use archive::{
    archive_file_name, archive_index, pack_directory, page_extension, page_file_name,
    ARCHIVE_EXTENSION,
};

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tempfile::TempDir;
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::remote::{RemoteChapter, RemoteError};
use crate::resolver::SeriesHandle;

/// Prefix of scratch directories holding a chapter's pages.
const STAGING_PREFIX: &str = "manga-";

/// Errors that can occur while synchronizing chapters.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write archive {path}: {source}")]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("archive task failed: {0}")]
    Task(String),
}

/// What one `sync` pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Indices downloaded during this pass, ascending.
    pub downloaded: Vec<i64>,
    /// Remote chapters already present locally.
    pub skipped: usize,
}

/// Indices of the chapter archives present in `series_dir`.
///
/// A missing directory means nothing has been downloaded yet.
pub async fn local_indices(series_dir: &Path) -> Result<BTreeSet<i64>, SyncError> {
    let mut indices = BTreeSet::new();

    let mut entries = match fs::read_dir(series_dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(indices),
        Err(e) => {
            return Err(SyncError::Io {
                path: series_dir.to_path_buf(),
                source: e,
            })
        }
    };

    while let Some(entry) = entries.next_entry().await.map_err(|e| SyncError::Io {
        path: series_dir.to_path_buf(),
        source: e,
    })? {
        if let Some(index) = archive_index(&entry.file_name().to_string_lossy()) {
            indices.insert(index);
        }
    }

    Ok(indices)
}

/// Synchronizes the chapters of one resolved series into its directory.
pub struct ChapterSynchronizer<'a> {
    handle: &'a SeriesHandle,
    series_dir: PathBuf,
    staging_root: Option<PathBuf>,
}

impl<'a> ChapterSynchronizer<'a> {
    pub fn new(handle: &'a SeriesHandle, series_dir: impl Into<PathBuf>) -> Self {
        Self {
            handle,
            series_dir: series_dir.into(),
            staging_root: None,
        }
    }

    /// Create scratch directories under `root` instead of the system temp dir.
    pub fn with_staging_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.staging_root = Some(root.into());
        self
    }

    /// Remote chapters in ascending index order (online refresh).
    pub async fn list_chapters(&self) -> Result<Vec<RemoteChapter>, SyncError> {
        let mut chapters = self.handle.client.chapters(self.handle.id()).await?;
        chapters.sort_by_key(|c| c.index);
        Ok(chapters)
    }

    /// Download every remote chapter whose index has no local archive.
    ///
    /// Stops at the first failing chapter; archives finalized before the
    /// failure stay in place.
    pub async fn sync(&self) -> Result<SyncReport, SyncError> {
        let chapters = self.list_chapters().await?;
        let mut present = local_indices(&self.series_dir).await?;
        let mut report = SyncReport::default();

        for chapter in &chapters {
            if present.contains(&chapter.index) {
                report.skipped += 1;
                continue;
            }

            let path = self.download_chapter(chapter).await?;
            info!(
                title = %self.handle.title,
                index = chapter.index,
                chapter = %chapter.name,
                "Downloaded chapter to {}",
                path.display()
            );
            present.insert(chapter.index);
            report.downloaded.push(chapter.index);
        }

        Ok(report)
    }

    fn staging_dir(&self) -> Result<TempDir, SyncError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(STAGING_PREFIX);

        let staged = match &self.staging_root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        };

        staged.map_err(|e| SyncError::Io {
            path: self
                .staging_root
                .clone()
                .unwrap_or_else(std::env::temp_dir),
            source: e,
        })
    }

    /// Download one chapter and package it, returning the archive path.
    pub async fn download_chapter(&self, chapter: &RemoteChapter) -> Result<PathBuf, SyncError> {
        let series_id = self.handle.id();
        let detail = self.handle.client.chapter(series_id, chapter.index).await?;

        if detail.page_count <= 0 {
            warn!(
                title = %self.handle.title,
                index = chapter.index,
                page_count = detail.page_count,
                "Chapter has no pages, writing an empty archive"
            );
        }

        // Dropped (and deleted) on every return path below.
        let staging = self.staging_dir()?;

        for page in 0..detail.page_count {
            let image = self
                .handle
                .client
                .page(series_id, detail.index, page)
                .await?;

            let path = staging.path().join(page_file_name(page, &image.mime));
            fs::write(&path, &image.bytes)
                .await
                .map_err(|e| SyncError::Io { path, source: e })?;
        }
        debug!(
            index = chapter.index,
            pages = detail.page_count,
            "All pages staged"
        );

        fs::create_dir_all(&self.series_dir)
            .await
            .map_err(|e| SyncError::Io {
                path: self.series_dir.clone(),
                source: e,
            })?;

        let destination = self
            .series_dir
            .join(archive_file_name(&chapter.name, chapter.index));

        let staged = staging.path().to_path_buf();
        let target = destination.clone();
        tokio::task::spawn_blocking(move || pack_directory(&staged, &target))
            .await
            .map_err(|e| SyncError::Task(e.to_string()))??;

        Ok(destination)
    }
}
