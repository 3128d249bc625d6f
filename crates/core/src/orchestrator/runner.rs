//! Sync orchestrator implementation.
//!
//! One task per source group; series inside a group run strictly one after
//! the other. A failing series is logged and skipped, never aborting its
//! group or any other group.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::fs;
use tracing::{error, info};

use crate::config::{SeriesConfig, SourceGroups};
use crate::export::{export_cover, export_metadata};
use crate::remote::RemoteApi;
use crate::resolver::SeriesResolver;
use crate::sync::ChapterSynchronizer;

use super::types::{GroupReport, RunReport, SeriesError, SeriesReport};

/// Drives resolution, export and chapter sync for every configured series.
#[derive(Clone)]
pub struct Orchestrator {
    resolver: Arc<SeriesResolver>,
    library_dir: PathBuf,
    staging_root: Option<PathBuf>,
}

impl Orchestrator {
    /// Create an orchestrator writing series directories under `library_dir`.
    pub fn new(remote: Arc<dyn RemoteApi>, library_dir: impl Into<PathBuf>) -> Self {
        Self {
            resolver: Arc::new(SeriesResolver::new(remote)),
            library_dir: library_dir.into(),
            staging_root: None,
        }
    }

    /// Stage chapter pages under `root` instead of the system temp dir.
    pub fn with_staging_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.staging_root = Some(root.into());
        self
    }

    /// Process every group concurrently and wait for all of them.
    pub async fn run(&self, groups: &SourceGroups) -> RunReport {
        info!(
            groups = groups.len(),
            series = groups.series_count(),
            "Starting sync run"
        );

        let workers: Vec<_> = groups
            .source_ids()
            .map(|source_id| {
                let this = self.clone();
                let groups = groups.clone();
                let handle = tokio::spawn(async move {
                    this.process_group(source_id, groups.series(source_id))
                        .await
                });
                (source_id, handle)
            })
            .collect();

        let (source_ids, handles): (Vec<i64>, Vec<_>) = workers.into_iter().unzip();
        let results = futures::future::join_all(handles).await;

        let mut report = RunReport::default();
        for (source_id, result) in source_ids.into_iter().zip(results) {
            match result {
                Ok(group) => report.absorb(group),
                Err(e) => {
                    error!(source_id, "Source group worker died: {}", e);
                    report.aborted_groups.push(source_id);
                }
            }
        }

        info!(
            series = report.series_total,
            failed = report.series_failed(),
            chapters = report.chapters_downloaded(),
            "Sync run finished"
        );
        report
    }

    /// Process the series of one source, sequentially.
    async fn process_group(&self, source_id: i64, series: &[SeriesConfig]) -> GroupReport {
        let mut report = GroupReport {
            source_id,
            ..Default::default()
        };

        for config in series {
            report.attempted += 1;
            match self.process_series(config).await {
                Ok(series_report) => report.succeeded.push(series_report),
                Err(e) => {
                    error!(
                        title = %config.title,
                        source_id,
                        "Failed to sync series: {}",
                        e
                    );
                    report.failed.push(config.title.clone());
                }
            }
        }

        report
    }

    /// Resolve one series, export its metadata and cover, then sync chapters.
    pub async fn process_series(&self, config: &SeriesConfig) -> Result<SeriesReport, SeriesError> {
        let handle = self.resolver.resolve(config).await?;

        let series_dir = self.library_dir.join(&config.title);
        fs::create_dir_all(&series_dir)
            .await
            .map_err(|e| SeriesError::Directory {
                path: series_dir.clone(),
                source: e,
            })?;

        export_metadata(&handle, &series_dir).await?;
        let cover_written = export_cover(&handle, &series_dir).await?;

        let mut synchronizer = ChapterSynchronizer::new(&handle, &series_dir);
        if let Some(root) = &self.staging_root {
            synchronizer = synchronizer.with_staging_root(root);
        }
        let sync = synchronizer.sync().await?;

        Ok(SeriesReport {
            title: config.title.clone(),
            series_id: handle.id(),
            cover_written,
            sync,
        })
    }
}
