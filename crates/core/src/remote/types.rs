//! Wire types for the remote server API.

use serde::{Deserialize, Serialize};

/// A catalogue source as reported by `v1/source/{id}`.
///
/// The server answers with an empty (or null) name when the source id does
/// not resolve to an installed extension.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RemoteSource {
    #[serde(default)]
    pub name: Option<String>,
}

impl RemoteSource {
    /// Whether the source resolved to an installed extension.
    pub fn is_installed(&self) -> bool {
        self.name.as_deref().is_some_and(|n| !n.is_empty())
    }
}

/// A series record in the remote library.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteSeries {
    /// Server-assigned id; chapter and page endpoints are keyed by it.
    pub id: i64,
    pub url: String,
    /// The server serializes source ids as strings.
    pub source_id: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "genre")]
    pub genres: Option<Vec<String>>,
    #[serde(default)]
    pub status: Option<String>,
}

impl RemoteSeries {
    /// Exact match on both source id and url.
    pub fn matches(&self, source_id: i64, url: &str) -> bool {
        self.url == url && self.source_id == source_id.to_string()
    }
}

/// A chapter of a remote series.
///
/// `index` is the stable identity used to match local archives; listings
/// come back in no particular order.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteChapter {
    pub index: i64,
    #[serde(default)]
    pub name: String,
    /// Only reliable on the chapter detail endpoint; listings may report -1.
    #[serde(default)]
    pub page_count: i64,
}

/// A downloaded image with its resolved MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub bytes: Vec<u8>,
    /// Sniffed from the content when recognised, otherwise the declared header.
    pub mime: String,
}
