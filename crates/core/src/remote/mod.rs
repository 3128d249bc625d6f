//! Remote server access.
//!
//! [`RemoteApi`] is the capability the rest of the crate depends on: one
//! method per endpoint used by the sync pipeline. [`SuwayomiClient`] is the
//! HTTP implementation; tests use `testing::MockRemote`.
//!
//! Endpoints fall in two classes:
//! - **read**: source lookup, library listing, chapters, pages, thumbnails
//! - **write**: extension catalogue refresh, extension install, backup import
//!
//! Write-class calls change server-side state and must not interleave. This
//! module does not serialize them itself; callers hold
//! `resolver::SeriesResolver`'s catalogue lock around each one.

mod client;
mod sniff;
mod types;

pub use client::SuwayomiClient;
pub use sniff::sniff_mime;
pub use types::*;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

/// Errors that can occur when talking to the remote server.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The request did not complete (connection refused, reset, timeout).
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a status >= 300.
    #[error("failed to fetch {endpoint} (HTTP {status}): {body}")]
    Server {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// The response body could not be decoded.
    #[error("invalid response from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },

    /// An image endpoint returned no bytes to sniff.
    #[error("empty response body from {endpoint}")]
    EmptyBody { endpoint: String },

    /// Client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

impl RemoteError {
    /// HTTP status for server errors.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Server { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Capability interface over the remote server API.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    /// Health check. Succeeds iff the request completes; the status is ignored.
    async fn ping(&self) -> Result<(), RemoteError>;

    /// Look up a source by id.
    async fn source(&self, source_id: i64) -> Result<RemoteSource, RemoteError>;

    /// Refresh the extension catalogue. Write-class.
    async fn refresh_extensions(&self) -> Result<(), RemoteError>;

    /// Install an extension package. Write-class.
    async fn install_extension(&self, package: &str) -> Result<(), RemoteError>;

    /// List the library entries of a category (0 = default).
    async fn library(&self, category: u32) -> Result<Vec<RemoteSeries>, RemoteError>;

    /// Submit a gzip-compressed protobuf backup for import. Write-class.
    async fn import_backup(&self, payload: Vec<u8>) -> Result<(), RemoteError>;

    /// List chapters, forcing the server to refresh from the source.
    async fn chapters(&self, series_id: i64) -> Result<Vec<RemoteChapter>, RemoteError>;

    /// Fetch one chapter's detail, including its real page count.
    async fn chapter(&self, series_id: i64, index: i64) -> Result<RemoteChapter, RemoteError>;

    /// Fetch one page image.
    async fn page(&self, series_id: i64, index: i64, page: i64) -> Result<Image, RemoteError>;

    /// Fetch the series thumbnail.
    async fn thumbnail(&self, series_id: i64) -> Result<Image, RemoteError>;
}

/// Block until the server answers its health endpoint.
///
/// Failed probes mean "not ready yet" and are retried forever, `delay`
/// apart.
pub async fn wait_until_ready(remote: &dyn RemoteApi, delay: Duration) {
    let mut attempts = 0u64;
    loop {
        attempts += 1;
        match remote.ping().await {
            Ok(()) => {
                debug!(attempts, "Remote server is ready");
                return;
            }
            Err(e) => {
                debug!(attempts, "Remote server not ready: {}", e);
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RemoteError::Server {
            endpoint: "v1/category/0".to_string(),
            status: 500,
            body: "boom".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "failed to fetch v1/category/0 (HTTP 500): boom"
        );
        assert_eq!(err.status(), Some(500));

        let err = RemoteError::EmptyBody {
            endpoint: "v1/manga/1/thumbnail".to_string(),
        };
        assert_eq!(err.status(), None);
    }

    #[tokio::test]
    async fn test_wait_until_ready_retries_failed_probes() {
        use crate::testing::{MockRemote, RemoteCall};

        let remote = MockRemote::new();
        remote.fail_pings(3).await;

        wait_until_ready(&remote, Duration::from_millis(1)).await;

        let pings = remote
            .calls()
            .await
            .into_iter()
            .filter(|c| *c == RemoteCall::Ping)
            .count();
        assert_eq!(pings, 4);
    }
}
