//! Registration payload: a reader backup holding a single series.
//!
//! The server has no "add to library by url" endpoint; importing a backup
//! that lists only `{source, url}` makes it fetch and register the series.

use std::io::{Read, Write};

use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use prost::Message;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("failed to compress backup: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid backup payload: {0}")]
    Decode(#[from] prost::DecodeError),
}

/// Top-level backup message. Only the series list is populated.
#[derive(Clone, PartialEq, Message)]
pub struct Backup {
    #[prost(message, repeated, tag = "1")]
    pub backup_manga: Vec<BackupManga>,
}

/// One series entry. Fields are proto2-optional so a zero source id is
/// still written on the wire.
#[derive(Clone, PartialEq, Message)]
pub struct BackupManga {
    #[prost(int64, optional, tag = "1")]
    pub source: Option<i64>,
    #[prost(string, optional, tag = "2")]
    pub url: Option<String>,
}

/// Build the gzip-compressed payload registering one series.
pub fn encode_registration(source_id: i64, url: &str) -> Result<Vec<u8>, BackupError> {
    let backup = Backup {
        backup_manga: vec![BackupManga {
            source: Some(source_id),
            url: Some(url.to_string()),
        }],
    };

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&backup.encode_to_vec())?;
    Ok(encoder.finish()?)
}

/// Decode a payload produced by [`encode_registration`] into
/// `(source_id, url)` pairs.
pub fn decode_registration(payload: &[u8]) -> Result<Vec<(i64, String)>, BackupError> {
    let mut raw = Vec::new();
    GzDecoder::new(payload).read_to_end(&mut raw)?;

    let backup = Backup::decode(raw.as_slice())?;
    Ok(backup
        .backup_manga
        .into_iter()
        .map(|m| (m.source.unwrap_or_default(), m.url.unwrap_or_default()))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_is_gzip() {
        let payload = encode_registration(1, "/foo").unwrap();
        assert_eq!(&payload[..2], &[0x1f, 0x8b]);
    }

    #[test]
    fn test_registration_survives_decoding() {
        let payload = encode_registration(2499283573021220255, "/manga/foo?id=1").unwrap();
        let entries = decode_registration(&payload).unwrap();
        assert_eq!(
            entries,
            vec![(2499283573021220255, "/manga/foo?id=1".to_string())]
        );
    }

    #[test]
    fn test_zero_source_id_is_on_the_wire() {
        let backup = Backup {
            backup_manga: vec![BackupManga {
                source: Some(0),
                url: Some("/x".to_string()),
            }],
        };
        let bytes = backup.encode_to_vec();
        // backupManga (field 1, length-delimited) wrapping source (field 1, varint 0)
        assert_eq!(&bytes[..4], &[0x0a, 0x06, 0x08, 0x00]);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_registration(b"definitely not gzip").is_err());
    }
}
