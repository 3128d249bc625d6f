//! Suwayomi (Tachidesk) HTTP client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::sniff::sniff_mime;
use super::{Image, RemoteApi, RemoteChapter, RemoteError, RemoteSeries, RemoteSource};

/// Health endpoint; any completed response counts as alive.
const HEALTH_ENDPOINT: &str = "v1/settings/about";

/// Suwayomi REST client.
pub struct SuwayomiClient {
    client: Client,
    /// Server URL with the `api/` prefix, always ending in '/'.
    base_url: String,
}

impl SuwayomiClient {
    /// Create a new client for the server at `server_url`.
    ///
    /// `timeout` of `None` keeps the transport default (no overall timeout).
    pub fn new(server_url: &str, timeout: Option<Duration>) -> Result<Self, RemoteError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| RemoteError::Client(e.to_string()))?;

        Ok(Self {
            client,
            base_url: format!("{}/api/", server_url.trim_end_matches('/')),
        })
    }

    /// Get the API base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    fn transport(endpoint: &str, source: reqwest::Error) -> RemoteError {
        RemoteError::Transport {
            endpoint: endpoint.to_string(),
            source,
        }
    }

    /// Issue a GET and return the body with the declared content type.
    async fn fetch(&self, endpoint: &str) -> Result<(Vec<u8>, String), RemoteError> {
        debug!(endpoint, "GET");

        let response = self
            .client
            .get(self.url(endpoint))
            .send()
            .await
            .map_err(|e| Self::transport(endpoint, e))?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let body = response
            .bytes()
            .await
            .map_err(|e| Self::transport(endpoint, e))?;

        if status.as_u16() >= 300 {
            return Err(RemoteError::Server {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        Ok((body.to_vec(), content_type))
    }

    /// GET an endpoint and return the raw body.
    pub async fn get(&self, endpoint: &str) -> Result<Vec<u8>, RemoteError> {
        self.fetch(endpoint).await.map(|(body, _)| body)
    }

    /// GET an endpoint and decode its JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, RemoteError> {
        let body = self.get(endpoint).await?;
        serde_json::from_slice(&body).map_err(|e| RemoteError::Decode {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        })
    }

    /// POST a raw body. A successful response body is ignored; an error
    /// status carries the body as its diagnostic.
    pub async fn post_body(&self, endpoint: &str, body: Vec<u8>) -> Result<(), RemoteError> {
        debug!(endpoint, bytes = body.len(), "POST");

        let response = self
            .client
            .post(self.url(endpoint))
            .body(body)
            .send()
            .await
            .map_err(|e| Self::transport(endpoint, e))?;

        let status = response.status();
        if status.as_u16() >= 300 {
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<failed to read response body: {}>", e));
            return Err(RemoteError::Server {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }

    /// GET an image, recovering its real MIME type from the content.
    pub async fn get_image(&self, endpoint: &str) -> Result<Image, RemoteError> {
        let (bytes, declared) = self.fetch(endpoint).await?;
        let mime = sniff_mime(&bytes, &declared).ok_or_else(|| RemoteError::EmptyBody {
            endpoint: endpoint.to_string(),
        })?;

        Ok(Image { bytes, mime })
    }
}

#[async_trait]
impl RemoteApi for SuwayomiClient {
    async fn ping(&self) -> Result<(), RemoteError> {
        debug!(endpoint = HEALTH_ENDPOINT, "GET");
        self.client
            .get(self.url(HEALTH_ENDPOINT))
            .send()
            .await
            .map(|_| ())
            .map_err(|e| Self::transport(HEALTH_ENDPOINT, e))
    }

    async fn source(&self, source_id: i64) -> Result<RemoteSource, RemoteError> {
        self.get_json(&format!("v1/source/{}", source_id)).await
    }

    async fn refresh_extensions(&self) -> Result<(), RemoteError> {
        self.get("v1/extension/list").await.map(|_| ())
    }

    async fn install_extension(&self, package: &str) -> Result<(), RemoteError> {
        let endpoint = format!("v1/extension/install/{}", urlencoding::encode(package));
        self.get(&endpoint).await.map(|_| ())
    }

    async fn library(&self, category: u32) -> Result<Vec<RemoteSeries>, RemoteError> {
        self.get_json(&format!("v1/category/{}", category)).await
    }

    async fn import_backup(&self, payload: Vec<u8>) -> Result<(), RemoteError> {
        debug!(bytes = payload.len(), "Importing backup");
        self.post_body("v1/backup/import", payload).await
    }

    async fn chapters(&self, series_id: i64) -> Result<Vec<RemoteChapter>, RemoteError> {
        self.get_json(&format!("v1/manga/{}/chapters?onlineFetch=true", series_id))
            .await
    }

    async fn chapter(&self, series_id: i64, index: i64) -> Result<RemoteChapter, RemoteError> {
        self.get_json(&format!("v1/manga/{}/chapter/{}", series_id, index))
            .await
    }

    async fn page(&self, series_id: i64, index: i64, page: i64) -> Result<Image, RemoteError> {
        self.get_image(&format!(
            "v1/manga/{}/chapter/{}/page/{}",
            series_id, index, page
        ))
        .await
    }

    async fn thumbnail(&self, series_id: i64) -> Result<Image, RemoteError> {
        self.get_image(&format!("v1/manga/{}/thumbnail", series_id))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_normalization() {
        let client = SuwayomiClient::new("http://localhost:4567/", None).unwrap();
        assert_eq!(client.base_url(), "http://localhost:4567/api/");

        let client = SuwayomiClient::new("http://localhost:4567", None).unwrap();
        assert_eq!(client.base_url(), "http://localhost:4567/api/");
        assert_eq!(
            client.url("v1/category/0"),
            "http://localhost:4567/api/v1/category/0"
        );
    }

    #[tokio::test]
    async fn test_ping_unreachable_server_fails() {
        // Port 9 (discard) is never served in test environments.
        let client =
            SuwayomiClient::new("http://127.0.0.1:9/", Some(Duration::from_secs(2))).unwrap();
        let err = client.ping().await.unwrap_err();
        assert!(matches!(err, RemoteError::Transport { .. }));
    }
}
