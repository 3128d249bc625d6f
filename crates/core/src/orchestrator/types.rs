//! Types for the sync orchestrator.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::sync::SyncReport;

/// Errors that abort one series for the current run.
#[derive(Debug, Error)]
pub enum SeriesError {
    /// Source install or library registration failed.
    #[error("resolve failed: {0}")]
    Resolve(#[from] crate::resolver::ResolveError),

    /// Writing details or cover failed.
    #[error("export failed: {0}")]
    Export(#[from] crate::export::ExportError),

    /// Chapter listing or download failed.
    #[error("sync failed: {0}")]
    Sync(#[from] crate::sync::SyncError),

    /// Series directory could not be created.
    #[error("failed to create series directory {path}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result of processing one series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeriesReport {
    pub title: String,
    pub series_id: i64,
    pub cover_written: bool,
    pub sync: SyncReport,
}

/// Result of one orchestrator run, available once every group finished.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Number of series attempted.
    pub series_total: usize,
    /// Titles of series that failed, per source.
    pub failed: BTreeMap<i64, Vec<String>>,
    /// Chapter indices downloaded, per title.
    pub downloaded: BTreeMap<String, Vec<i64>>,
    /// Source groups whose worker died before finishing.
    pub aborted_groups: Vec<i64>,
}

impl RunReport {
    pub fn series_failed(&self) -> usize {
        self.failed.values().map(Vec::len).sum()
    }

    pub fn chapters_downloaded(&self) -> usize {
        self.downloaded.values().map(Vec::len).sum()
    }

    /// Fold one group's results in.
    pub(crate) fn absorb(&mut self, group: GroupReport) {
        self.series_total += group.attempted;
        if !group.failed.is_empty() {
            self.failed.insert(group.source_id, group.failed);
        }
        for series in group.succeeded {
            if !series.sync.downloaded.is_empty() {
                self.downloaded.insert(series.title, series.sync.downloaded);
            }
        }
    }
}

/// Results of one source group.
#[derive(Debug, Default)]
pub(crate) struct GroupReport {
    pub source_id: i64,
    pub attempted: usize,
    pub succeeded: Vec<SeriesReport>,
    pub failed: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::ResolveError;

    #[test]
    fn test_run_report_absorb() {
        let mut report = RunReport::default();
        report.absorb(GroupReport {
            source_id: 1,
            attempted: 2,
            succeeded: vec![SeriesReport {
                title: "Foo".to_string(),
                series_id: 10,
                cover_written: true,
                sync: SyncReport {
                    downloaded: vec![1, 2],
                    skipped: 0,
                },
            }],
            failed: vec!["Bar".to_string()],
        });
        report.absorb(GroupReport {
            source_id: 2,
            attempted: 1,
            ..Default::default()
        });

        assert_eq!(report.series_total, 3);
        assert_eq!(report.series_failed(), 1);
        assert_eq!(report.chapters_downloaded(), 2);
        assert_eq!(report.failed.get(&1), Some(&vec!["Bar".to_string()]));
        assert!(!report.failed.contains_key(&2));
    }

    #[test]
    fn test_error_display() {
        let err = SeriesError::from(ResolveError::NotRegistered {
            source_id: 1,
            url: "/foo".to_string(),
        });
        assert_eq!(
            err.to_string(),
            "resolve failed: series /foo (source 1) missing from library after import"
        );
    }
}
