//! Mock remote server for testing.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::remote::{
    sniff_mime, Image, RemoteApi, RemoteChapter, RemoteError, RemoteSeries, RemoteSource,
};
use crate::resolver::decode_registration;

use super::fixtures;

/// A recorded remote call for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    Ping,
    Source(i64),
    RefreshExtensions,
    InstallExtension(String),
    Library(u32),
    /// Decoded `(source_id, url)` entries of the imported backup.
    ImportBackup(Vec<(i64, String)>),
    Chapters(i64),
    Chapter(i64, i64),
    Page(i64, i64, i64),
    Thumbnail(i64),
}

impl RemoteCall {
    /// Whether this is one of the calls that must be serialized.
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Self::RefreshExtensions | Self::InstallExtension(_) | Self::ImportBackup(_)
        )
    }
}

/// A failure to inject. Matching calls answer HTTP 500.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Failure {
    Source(i64),
    RefreshExtensions,
    InstallExtension(String),
    Library,
    /// Imports registering a series of this source.
    Import(i64),
    Chapters(i64),
    Chapter(i64, i64),
    Page(i64, i64, i64),
    Thumbnail(i64),
}

#[derive(Debug, Default)]
struct MockState {
    calls: Vec<RemoteCall>,
    installed_sources: HashSet<i64>,
    /// Extension package -> sources it provides once installed.
    packages: HashMap<String, Vec<i64>>,
    library: Vec<RemoteSeries>,
    /// Series that an import will materialize, keyed by (source, url).
    catalogue: HashMap<(i64, String), RemoteSeries>,
    next_series_id: i64,
    chapters: HashMap<i64, Vec<RemoteChapter>>,
    thumbnails: HashMap<i64, Vec<u8>>,
    failures: HashSet<Failure>,
    ping_failures_left: usize,
    ignore_imports: bool,
}

/// Mock implementation of the RemoteApi trait.
///
/// Provides controllable behavior for testing:
/// - Record every call in order for assertions
/// - Model extension installation and backup-import registration
/// - Inject HTTP 500 failures per endpoint, source, chapter or page
/// - Track how many write-class calls ever ran at the same time
///
/// # Example
///
/// ```rust,ignore
/// let remote = MockRemote::new();
/// remote.provide_package("pkg", 1).await;
/// remote.add_catalogue_series(fixtures::remote_series(1, 10, "/foo")).await;
/// remote.set_chapters(10, vec![fixtures::chapter(1, "Chapter 1", 3)]).await;
///
/// // ... run the pipeline ...
///
/// assert_eq!(remote.import_count().await, 1);
/// ```
#[derive(Debug)]
pub struct MockRemote {
    state: RwLock<MockState>,
    writes_in_flight: AtomicUsize,
    max_writes_in_flight: AtomicUsize,
    write_delay: Duration,
}

impl Default for MockRemote {
    fn default() -> Self {
        Self::new()
    }
}

/// Decrements the in-flight write counter when dropped.
struct WriteGuard<'a>(&'a AtomicUsize);

impl Drop for WriteGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MockRemote {
    /// Create a new mock remote with an empty library.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(MockState {
                next_series_id: 1000,
                ..Default::default()
            }),
            writes_in_flight: AtomicUsize::new(0),
            max_writes_in_flight: AtomicUsize::new(0),
            write_delay: Duration::from_millis(5),
        }
    }

    /// Mark a source as already installed.
    pub async fn install_source(&self, source_id: i64) {
        self.state.write().await.installed_sources.insert(source_id);
    }

    /// Register an extension package that provides `source_id` once installed.
    pub async fn provide_package(&self, package: &str, source_id: i64) {
        self.state
            .write()
            .await
            .packages
            .entry(package.to_string())
            .or_default()
            .push(source_id);
    }

    /// Put a series straight into the library.
    pub async fn add_library_series(&self, series: RemoteSeries) {
        self.state.write().await.library.push(series);
    }

    /// Make a series available for registration by backup import.
    pub async fn add_catalogue_series(&self, series: RemoteSeries) {
        let source_id = series.source_id.parse().unwrap_or_default();
        self.state
            .write()
            .await
            .catalogue
            .insert((source_id, series.url.clone()), series);
    }

    /// Set the chapter listing of a series, in the order the server returns it.
    pub async fn set_chapters(&self, series_id: i64, chapters: Vec<RemoteChapter>) {
        self.state.write().await.chapters.insert(series_id, chapters);
    }

    /// Set the thumbnail bytes of a series.
    pub async fn set_thumbnail(&self, series_id: i64, bytes: Vec<u8>) {
        self.state.write().await.thumbnails.insert(series_id, bytes);
    }

    /// Inject a failure.
    pub async fn fail(&self, failure: Failure) {
        self.state.write().await.failures.insert(failure);
    }

    /// Remove an injected failure.
    pub async fn recover(&self, failure: &Failure) {
        self.state.write().await.failures.remove(failure);
    }

    /// Fail the next `count` health checks with a transport-like error.
    pub async fn fail_pings(&self, count: usize) {
        self.state.write().await.ping_failures_left = count;
    }

    /// Accept imports without adding anything to the library.
    pub async fn ignore_imports(&self) {
        self.state.write().await.ignore_imports = true;
    }

    /// All recorded calls, in order.
    pub async fn calls(&self) -> Vec<RemoteCall> {
        self.state.read().await.calls.clone()
    }

    /// Clear recorded calls.
    pub async fn clear_calls(&self) {
        self.state.write().await.calls.clear();
    }

    /// Number of backup imports attempted.
    pub async fn import_count(&self) -> usize {
        self.count(|c| matches!(c, RemoteCall::ImportBackup(_)))
            .await
    }

    /// Number of page downloads attempted.
    pub async fn page_requests(&self) -> usize {
        self.count(|c| matches!(c, RemoteCall::Page(..))).await
    }

    /// Number of thumbnail downloads attempted.
    pub async fn thumbnail_requests(&self) -> usize {
        self.count(|c| matches!(c, RemoteCall::Thumbnail(_))).await
    }

    /// Highest number of write-class calls observed running at once.
    pub fn max_concurrent_writes(&self) -> usize {
        self.max_writes_in_flight.load(Ordering::SeqCst)
    }

    async fn count(&self, predicate: impl Fn(&RemoteCall) -> bool) -> usize {
        self.state
            .read()
            .await
            .calls
            .iter()
            .filter(|c| predicate(c))
            .count()
    }

    /// Record a call and answer 500 if a matching failure is injected.
    async fn record(&self, call: RemoteCall, failure: Option<Failure>) -> Result<(), RemoteError> {
        let mut state = self.state.write().await;
        let endpoint = format!("{:?}", call);
        state.calls.push(call);

        match failure {
            Some(f) if state.failures.contains(&f) => Err(RemoteError::Server {
                endpoint,
                status: 500,
                body: format!("injected failure: {:?}", f),
            }),
            _ => Ok(()),
        }
    }

    /// Hold a write slot for a short while so overlapping writes are visible.
    async fn write_section(&self) {
        let now = self.writes_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = WriteGuard(&self.writes_in_flight);
        self.max_writes_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.write_delay).await;
    }
}

#[async_trait]
impl RemoteApi for MockRemote {
    async fn ping(&self) -> Result<(), RemoteError> {
        let mut state = self.state.write().await;
        state.calls.push(RemoteCall::Ping);
        if state.ping_failures_left > 0 {
            state.ping_failures_left -= 1;
            return Err(RemoteError::EmptyBody {
                endpoint: "v1/settings/about".to_string(),
            });
        }
        Ok(())
    }

    async fn source(&self, source_id: i64) -> Result<RemoteSource, RemoteError> {
        self.record(RemoteCall::Source(source_id), Some(Failure::Source(source_id)))
            .await?;

        let installed = self
            .state
            .read()
            .await
            .installed_sources
            .contains(&source_id);

        Ok(RemoteSource {
            name: Some(if installed {
                format!("Source {}", source_id)
            } else {
                String::new()
            }),
        })
    }

    async fn refresh_extensions(&self) -> Result<(), RemoteError> {
        self.write_section().await;
        self.record(RemoteCall::RefreshExtensions, Some(Failure::RefreshExtensions))
            .await
    }

    async fn install_extension(&self, package: &str) -> Result<(), RemoteError> {
        self.write_section().await;
        self.record(
            RemoteCall::InstallExtension(package.to_string()),
            Some(Failure::InstallExtension(package.to_string())),
        )
        .await?;

        let mut state = self.state.write().await;
        let provided = state.packages.get(package).cloned().unwrap_or_default();
        state.installed_sources.extend(provided);
        Ok(())
    }

    async fn library(&self, category: u32) -> Result<Vec<RemoteSeries>, RemoteError> {
        self.record(RemoteCall::Library(category), Some(Failure::Library))
            .await?;
        Ok(self.state.read().await.library.clone())
    }

    async fn import_backup(&self, payload: Vec<u8>) -> Result<(), RemoteError> {
        self.write_section().await;

        let entries = decode_registration(&payload).map_err(|e| RemoteError::Server {
            endpoint: "v1/backup/import".to_string(),
            status: 400,
            body: e.to_string(),
        })?;
        let source_failure = entries.first().map(|(source, _)| Failure::Import(*source));
        self.record(RemoteCall::ImportBackup(entries.clone()), source_failure)
            .await?;

        let mut state = self.state.write().await;
        if state.ignore_imports {
            return Ok(());
        }

        for (source_id, url) in entries {
            if state.library.iter().any(|s| s.matches(source_id, &url)) {
                continue;
            }
            let series = match state.catalogue.get(&(source_id, url.clone())) {
                Some(series) => series.clone(),
                None => {
                    state.next_series_id += 1;
                    fixtures::remote_series(source_id, state.next_series_id, &url)
                }
            };
            state.library.push(series);
        }
        Ok(())
    }

    async fn chapters(&self, series_id: i64) -> Result<Vec<RemoteChapter>, RemoteError> {
        self.record(RemoteCall::Chapters(series_id), Some(Failure::Chapters(series_id)))
            .await?;
        Ok(self
            .state
            .read()
            .await
            .chapters
            .get(&series_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn chapter(&self, series_id: i64, index: i64) -> Result<RemoteChapter, RemoteError> {
        self.record(
            RemoteCall::Chapter(series_id, index),
            Some(Failure::Chapter(series_id, index)),
        )
        .await?;

        self.state
            .read()
            .await
            .chapters
            .get(&series_id)
            .and_then(|list| list.iter().find(|c| c.index == index).cloned())
            .ok_or_else(|| RemoteError::Server {
                endpoint: format!("v1/manga/{}/chapter/{}", series_id, index),
                status: 404,
                body: "chapter not found".to_string(),
            })
    }

    async fn page(&self, series_id: i64, index: i64, page: i64) -> Result<Image, RemoteError> {
        self.record(
            RemoteCall::Page(series_id, index, page),
            Some(Failure::Page(series_id, index, page)),
        )
        .await?;

        let bytes = fixtures::png_bytes(page as u8);
        let mime = sniff_mime(&bytes, "application/octet-stream").unwrap_or_default();
        Ok(Image { bytes, mime })
    }

    async fn thumbnail(&self, series_id: i64) -> Result<Image, RemoteError> {
        self.record(RemoteCall::Thumbnail(series_id), Some(Failure::Thumbnail(series_id)))
            .await?;

        let bytes = self
            .state
            .read()
            .await
            .thumbnails
            .get(&series_id)
            .cloned()
            .unwrap_or_else(fixtures::jpeg_bytes);
        let mime = sniff_mime(&bytes, "image/jpeg").ok_or_else(|| RemoteError::EmptyBody {
            endpoint: format!("v1/manga/{}/thumbnail", series_id),
        })?;
        Ok(Image { bytes, mime })
    }
}
