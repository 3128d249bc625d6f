//! Testing utilities and a mock remote server.
//!
//! [`MockRemote`] implements [`crate::remote::RemoteApi`] in memory so the
//! whole pipeline can be exercised without a running server.
//!
//! # Example
//!
//! ```rust,ignore
//! use mangasync_core::testing::{fixtures, MockRemote};
//!
//! let remote = Arc::new(MockRemote::new());
//! remote.install_source(1).await;
//! remote.add_library_series(fixtures::remote_series(1, 10, "/foo")).await;
//! remote.set_chapters(10, fixtures::chapters(&[3, 1, 2], 4)).await;
//! ```

mod mock_remote;

pub use mock_remote::{Failure, MockRemote, RemoteCall};

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::config::SeriesConfig;
    use crate::remote::{RemoteChapter, RemoteSeries};

    /// Create a library record with reasonable defaults.
    pub fn remote_series(source_id: i64, id: i64, url: &str) -> RemoteSeries {
        RemoteSeries {
            id,
            url: url.to_string(),
            source_id: source_id.to_string(),
            author: Some(format!("Author of {}", url)),
            artist: Some("Artist".to_string()),
            description: Some("Description".to_string()),
            genres: Some(vec!["Action".to_string(), "Comedy".to_string()]),
            status: Some("ONGOING".to_string()),
        }
    }

    /// Create a chapter with a known page count.
    pub fn chapter(index: i64, name: &str, page_count: i64) -> RemoteChapter {
        RemoteChapter {
            index,
            name: name.to_string(),
            page_count,
        }
    }

    /// Create chapters named "Chapter N" for the given indices, in the given order.
    pub fn chapters(indices: &[i64], page_count: i64) -> Vec<RemoteChapter> {
        indices
            .iter()
            .map(|&i| chapter(i, &format!("Chapter {}", i), page_count))
            .collect()
    }

    /// Create a series configuration entry.
    pub fn series_config(title: &str, url: &str, source_id: i64, package: &str) -> SeriesConfig {
        SeriesConfig {
            title: title.to_string(),
            url: url.to_string(),
            source_id,
            extension_package: package.to_string(),
        }
    }

    /// Bytes that sniff as PNG, distinguished by `seed`.
    pub fn png_bytes(seed: u8) -> Vec<u8> {
        let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        bytes.extend_from_slice(&[0, 0, 0, 0x0D, seed]);
        bytes
    }

    /// Bytes that sniff as JPEG.
    pub fn jpeg_bytes() -> Vec<u8> {
        vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00]
    }
}
