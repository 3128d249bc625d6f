//! Content-type recovery for image downloads.
//!
//! Sources frequently proxy images with a wrong or generic content type, so
//! the magic number wins over the declared header whenever it is known.

/// Resolve the MIME type of a downloaded body.
///
/// Returns `None` when there is nothing to sniff (empty body). Unrecognised
/// content falls back to `declared`.
pub fn sniff_mime(bytes: &[u8], declared: &str) -> Option<String> {
    if bytes.is_empty() {
        return None;
    }

    match infer::get(bytes) {
        Some(kind) => Some(kind.mime_type().to_string()),
        None => Some(declared.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
    const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0, 0x10, b'J', b'F', b'I', b'F'];

    #[test]
    fn test_magic_overrides_declared_type() {
        assert_eq!(
            sniff_mime(PNG, "application/octet-stream").as_deref(),
            Some("image/png")
        );
        assert_eq!(sniff_mime(JPEG, "image/png").as_deref(), Some("image/jpeg"));
    }

    #[test]
    fn test_unknown_content_uses_declared_type() {
        assert_eq!(
            sniff_mime(b"not an image", "image/x-custom").as_deref(),
            Some("image/x-custom")
        );
    }

    #[test]
    fn test_empty_body_fails() {
        assert!(sniff_mime(&[], "image/png").is_none());
    }
}
