//! Chapter archive naming and packaging.
//!
//! Archive filenames are the only persisted record of what has been
//! downloaded: `<base64url(name)>.<index>.zip`. The index is recovered from
//! the second-to-last dot-separated token, and base64url never produces a
//! '.', so the encoding round-trips for any chapter name.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use tempfile::NamedTempFile;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

use super::SyncError;

/// Archive extension.
pub const ARCHIVE_EXTENSION: &str = "zip";

/// Extension used when a MIME type maps to nothing known.
const FALLBACK_EXTENSION: &str = "bin";

/// Deterministic archive filename for a chapter.
pub fn archive_file_name(name: &str, index: i64) -> String {
    format!(
        "{}.{}.{}",
        URL_SAFE_NO_PAD.encode(name.as_bytes()),
        index,
        ARCHIVE_EXTENSION
    )
}

/// Chapter index encoded in a filename, if any.
///
/// Anything whose second-to-last token is not an integer is not an archive
/// and yields `None` (never index 0).
pub fn archive_index(file_name: &str) -> Option<i64> {
    let parts: Vec<&str> = file_name.split('.').collect();
    if parts.len() < 2 {
        return None;
    }
    parts[parts.len() - 2].parse().ok()
}

/// Staged filename for a page: zero-padded position plus an extension
/// derived from its MIME type.
pub fn page_file_name(page: i64, mime: &str) -> String {
    format!("{:06}.{}", page, page_extension(mime))
}

/// File extension for a MIME type.
pub fn page_extension(mime: &str) -> &'static str {
    let essence = mime
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    match essence.as_str() {
        "image/jpeg" | "image/jpg" | "image/pjpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/avif" => "avif",
        "image/bmp" => "bmp",
        "image/tiff" => "tiff",
        "image/heic" => "heic",
        "image/heif" => "heif",
        "image/jxl" => "jxl",
        "image/svg+xml" => "svg",
        "" => FALLBACK_EXTENSION,
        other => mime_guess::get_mime_extensions_str(other)
            .and_then(|exts| exts.first().copied())
            .unwrap_or(FALLBACK_EXTENSION),
    }
}

/// Package every file of `staging` into a zip at `destination`.
///
/// The archive is built in a hidden temporary file next to `destination`
/// and persisted with a no-clobber rename, so the final path either does
/// not exist or holds a complete archive. An existing `destination` is
/// never replaced.
pub fn pack_directory(staging: &Path, destination: &Path) -> Result<(), SyncError> {
    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source: io::Error| SyncError::Io { path, source }
    };
    let zip_err = |source: zip::result::ZipError| SyncError::Archive {
        path: destination.to_path_buf(),
        source,
    };

    let parent = destination.parent().unwrap_or_else(|| Path::new("."));

    let mut pages: Vec<PathBuf> = std::fs::read_dir(staging)
        .map_err(io_err(staging))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<_, _>>()
        .map_err(io_err(staging))?;
    pages.sort();

    let partial = NamedTempFile::new_in(parent).map_err(io_err(parent))?;

    // Pages are already compressed images; store them as-is with a fixed
    // timestamp so identical chapters produce identical archives.
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Stored)
        .last_modified_time(DateTime::default());

    let mut zip = ZipWriter::new(partial);
    for page in &pages {
        let entry_name = page
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        zip.start_file(entry_name, options).map_err(zip_err)?;
        let mut file = File::open(page).map_err(io_err(page))?;
        io::copy(&mut file, &mut zip).map_err(io_err(page))?;
    }
    let partial = zip.finish().map_err(zip_err)?;

    partial.as_file().sync_all().map_err(io_err(partial.path()))?;
    partial
        .persist_noclobber(destination)
        .map_err(|e| SyncError::Io {
            path: destination.to_path_buf(),
            source: e.error,
        })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::TempDir;
    use zip::ZipArchive;

    #[test]
    fn test_archive_file_name() {
        assert_eq!(archive_file_name("Chapter 1", 1), "Q2hhcHRlciAx.1.zip");
        assert_eq!(archive_file_name("", 4), ".4.zip");
        // '+' and '/' of standard base64 become '-' and '_'
        assert_eq!(archive_file_name("~~~", 2), "fn5-.2.zip");
        assert_eq!(archive_file_name("???", 3), "Pz8_.3.zip");
    }

    #[test]
    fn test_archive_index_round_trips() {
        for (name, index) in [("Chapter 1", 1), ("Vol.2 Ch.10.5", 105), ("", 0), ("Ω", -1)] {
            let file_name = archive_file_name(name, index);
            assert_eq!(archive_index(&file_name), Some(index), "{}", file_name);
        }
    }

    #[test]
    fn test_archive_index_skips_malformed_names() {
        assert_eq!(archive_index("details.json"), None);
        assert_eq!(archive_index("cover.jpg"), None);
        assert_eq!(archive_index("README"), None);
        assert_eq!(archive_index("abc.x1.zip"), None);
        assert_eq!(archive_index(".tmpA1b2C3"), None);
        assert_eq!(archive_index("12.zip"), Some(12));
    }

    #[test]
    fn test_page_file_name() {
        assert_eq!(page_file_name(0, "image/jpeg"), "000000.jpg");
        assert_eq!(page_file_name(12, "image/png"), "000012.png");
        assert_eq!(page_file_name(3, "image/webp; charset=binary"), "000003.webp");
        assert_eq!(page_file_name(1, ""), "000001.bin");
        assert_eq!(page_file_name(1, "application/x-nothing-known"), "000001.bin");
    }

    #[test]
    fn test_pack_directory() {
        let temp = TempDir::new().unwrap();
        let staging = temp.path().join("staging");
        std::fs::create_dir(&staging).unwrap();
        std::fs::write(staging.join("000001.png"), b"second").unwrap();
        std::fs::write(staging.join("000000.jpg"), b"first").unwrap();

        let destination = temp.path().join(archive_file_name("Chapter 1", 1));
        pack_directory(&staging, &destination).unwrap();

        let mut archive = ZipArchive::new(File::open(&destination).unwrap()).unwrap();
        assert_eq!(archive.len(), 2);

        let mut first = archive.by_index(0).unwrap();
        assert_eq!(first.name(), "000000.jpg");
        let mut contents = String::new();
        first.read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "first");
        drop(first);
        assert_eq!(archive.by_index(1).unwrap().name(), "000001.png");

        // Only the archive is left next to it; no partial files.
        let names: Vec<String> = std::fs::read_dir(temp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 2);
        assert!(names.contains(&"staging".to_string()));
    }

    #[test]
    fn test_pack_empty_directory() {
        let temp = TempDir::new().unwrap();
        let staging = temp.path().join("staging");
        std::fs::create_dir(&staging).unwrap();

        let destination = temp.path().join(archive_file_name("Extra", 7));
        pack_directory(&staging, &destination).unwrap();

        let archive = ZipArchive::new(File::open(&destination).unwrap()).unwrap();
        assert_eq!(archive.len(), 0);
        assert_eq!(archive_index(&archive_file_name("Extra", 7)), Some(7));
    }

    #[test]
    fn test_pack_directory_never_overwrites() {
        let temp = TempDir::new().unwrap();
        let staging = temp.path().join("staging");
        std::fs::create_dir(&staging).unwrap();
        std::fs::write(staging.join("000000.jpg"), b"new").unwrap();

        let destination = temp.path().join("existing.1.zip");
        std::fs::write(&destination, b"old").unwrap();

        let result = pack_directory(&staging, &destination);
        assert!(matches!(result, Err(SyncError::Io { .. })));
        assert_eq!(std::fs::read(&destination).unwrap(), b"old");
    }
}
