//! Series resolution: make sure a configured series exists in the remote
//! library and hand back a [`SeriesHandle`] bound to it.
//!
//! Resolution is idempotent. The library is searched before anything is
//! registered, so a series is imported at most once no matter how many
//! runs reference it.

mod backup;

pub use backup::{decode_registration, encode_registration, Backup, BackupError, BackupManga};

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::SeriesConfig;
use crate::remote::{RemoteApi, RemoteError, RemoteSeries};

/// Library category searched for existing series.
pub const DEFAULT_CATEGORY: u32 = 0;

/// Errors that can occur while resolving a series.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("failed to build registration backup: {0}")]
    Backup(#[from] BackupError),

    /// Import was accepted but the series still is not in the library.
    #[error("series {url} (source {source_id}) missing from library after import")]
    NotRegistered { source_id: i64, url: String },
}

/// A resolved series: remote record, the client it came from, and the local
/// display title.
#[derive(Clone)]
pub struct SeriesHandle {
    pub remote: RemoteSeries,
    pub client: Arc<dyn RemoteApi>,
    pub title: String,
}

impl SeriesHandle {
    /// Server-side series id.
    pub fn id(&self) -> i64 {
        self.remote.id
    }
}

impl fmt::Debug for SeriesHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeriesHandle")
            .field("remote", &self.remote)
            .field("title", &self.title)
            .finish_non_exhaustive()
    }
}

/// Resolves configured series against the remote library.
///
/// Shared by every source group. `catalog_lock` serializes the write-class
/// calls (extension catalogue refresh, extension install, backup import)
/// across all groups; read-class calls never take it.
pub struct SeriesResolver {
    remote: Arc<dyn RemoteApi>,
    catalog_lock: Mutex<()>,
}

impl SeriesResolver {
    pub fn new(remote: Arc<dyn RemoteApi>) -> Self {
        Self {
            remote,
            catalog_lock: Mutex::new(()),
        }
    }

    /// Run one write-class call under the catalogue lock.
    async fn serialized<F, T>(&self, call: F) -> T
    where
        F: Future<Output = T>,
    {
        let _guard = self.catalog_lock.lock().await;
        call.await
    }

    /// Resolve a configured series, installing its source and registering it
    /// if needed.
    pub async fn resolve(&self, config: &SeriesConfig) -> Result<SeriesHandle, ResolveError> {
        self.ensure_source(config.source_id, &config.extension_package)
            .await?;

        let remote = match self.find_series(config.source_id, &config.url).await? {
            Some(series) => series,
            None => {
                self.register(config.source_id, &config.url).await?;
                self.find_series(config.source_id, &config.url)
                    .await?
                    .ok_or_else(|| ResolveError::NotRegistered {
                        source_id: config.source_id,
                        url: config.url.clone(),
                    })?
            }
        };

        debug!(
            title = %config.title,
            series_id = remote.id,
            "Resolved series"
        );

        Ok(SeriesHandle {
            remote,
            client: Arc::clone(&self.remote),
            title: config.title.clone(),
        })
    }

    /// Install the extension providing `source_id` unless the server already
    /// knows the source.
    async fn ensure_source(&self, source_id: i64, package: &str) -> Result<(), ResolveError> {
        let source = self.remote.source(source_id).await?;
        if source.is_installed() {
            return Ok(());
        }

        info!(source_id, package, "Source not installed, installing extension");
        self.serialized(self.remote.refresh_extensions()).await?;
        self.serialized(self.remote.install_extension(package))
            .await?;

        Ok(())
    }

    /// Linear scan of the default category for an exact (source, url) match.
    pub async fn find_series(
        &self,
        source_id: i64,
        url: &str,
    ) -> Result<Option<RemoteSeries>, ResolveError> {
        let library = self.remote.library(DEFAULT_CATEGORY).await?;
        Ok(library.into_iter().find(|s| s.matches(source_id, url)))
    }

    /// Register a series by importing a one-entry backup.
    async fn register(&self, source_id: i64, url: &str) -> Result<(), ResolveError> {
        let payload = encode_registration(source_id, url)?;

        info!(source_id, url, "Registering series via backup import");
        self.serialized(self.remote.import_backup(payload)).await?;

        Ok(())
    }
}
