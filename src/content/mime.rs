//! MIME type detection and file-extension mapping for artifact payloads.

use std::path::Path;

/// MIME type → (category, extension). Unknown types fall back to `("other", "bin")`.
const MIME_TABLE: &[(&str, &str, &str)] = &[
    ("text/html", "html", "html"),
    ("application/xhtml+xml", "html", "html"),
    ("application/pdf", "pdf", "pdf"),
    ("image/png", "image", "png"),
    ("image/jpeg", "image", "jpg"),
    ("image/gif", "image", "gif"),
    ("image/webp", "image", "webp"),
    ("image/svg+xml", "image", "svg"),
    ("application/json", "json", "json"),
    ("text/plain", "text", "txt"),
    ("text/markdown", "text", "md"),
    ("text/csv", "text", "csv"),
    ("application/xml", "text", "xml"),
    ("text/xml", "text", "xml"),
];

const EXTENSION_TABLE: &[(&str, &str)] = &[
    ("html", "text/html"),
    ("htm", "text/html"),
    ("pdf", "application/pdf"),
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("svg", "image/svg+xml"),
    ("json", "application/json"),
    ("txt", "text/plain"),
    ("md", "text/markdown"),
    ("csv", "text/csv"),
    ("xml", "application/xml"),
];

pub const OCTET_STREAM: &str = "application/octet-stream";

fn lookup(mime_type: &str) -> Option<(&'static str, &'static str)> {
    let essence = mime_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    MIME_TABLE
        .iter()
        .find(|(m, _, _)| *m == essence)
        .map(|(_, category, ext)| (*category, *ext))
}

/// Coarse content category (`html`, `pdf`, `image`, `json`, `text`, `other`).
pub fn category(mime_type: &str) -> &'static str {
    lookup(mime_type).map(|(c, _)| c).unwrap_or("other")
}

/// File extension (without dot) for a MIME type, `bin` when unknown.
pub fn extension(mime_type: &str) -> &'static str {
    lookup(mime_type).map(|(_, e)| e).unwrap_or("bin")
}

/// Whether payloads of this type can be shown as UTF-8 text.
pub fn is_textual(mime_type: &str) -> bool {
    matches!(category(mime_type), "html" | "json" | "text")
        || mime_type.trim_start().starts_with("text/")
}

/// Detect a MIME type from a filename extension, falling back to magic numbers.
pub fn guess_mime_type(filename: Option<&str>, content: Option<&[u8]>) -> &'static str {
    if let Some(ext) = filename
        .and_then(|f| Path::new(f).extension())
        .and_then(|e| e.to_str())
    {
        let ext = ext.to_ascii_lowercase();
        if let Some((_, mime)) = EXTENSION_TABLE.iter().find(|(e, _)| *e == ext) {
            return mime;
        }
    }

    match content {
        Some(bytes) if bytes.len() >= 4 => sniff(bytes),
        _ => OCTET_STREAM,
    }
}

fn sniff(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(b"%PDF") {
        return "application/pdf";
    }
    if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        return "image/png";
    }
    if bytes.starts_with(b"\xff\xd8") {
        return "image/jpeg";
    }
    if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        return "image/gif";
    }
    let head: Vec<u8> = bytes.iter().take(5).map(u8::to_ascii_lowercase).collect();
    if head == b"<!doc" || head == b"<html" {
        return "text/html";
    }
    match bytes.iter().find(|b| !b.is_ascii_whitespace()) {
        Some(b'{') | Some(b'[') => "application/json",
        _ => OCTET_STREAM,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_wins_over_content() {
        assert_eq!(guess_mime_type(Some("paper.PDF"), Some(b"{}  ")), "application/pdf");
        assert_eq!(guess_mime_type(Some("notes.md"), None), "text/markdown");
    }

    #[test]
    fn magic_numbers_detected() {
        assert_eq!(guess_mime_type(None, Some(b"%PDF-1.7")), "application/pdf");
        assert_eq!(guess_mime_type(None, Some(b"\x89PNG\r\n\x1a\nrest")), "image/png");
        assert_eq!(guess_mime_type(None, Some(b"GIF89a..")), "image/gif");
        assert_eq!(guess_mime_type(None, Some(b"<!DOCTYPE html>")), "text/html");
        assert_eq!(guess_mime_type(Some("dump.unknown"), Some(b"  {\"a\": 1}")), "application/json");
    }

    #[test]
    fn unknown_falls_back_to_octet_stream() {
        assert_eq!(guess_mime_type(None, Some(b"\x00\x01\x02\x03")), OCTET_STREAM);
        assert_eq!(guess_mime_type(None, Some(b"ab")), OCTET_STREAM);
        assert_eq!(guess_mime_type(None, None), OCTET_STREAM);
    }

    #[test]
    fn categories_and_extensions() {
        assert_eq!(category("text/html; charset=utf-8"), "html");
        assert_eq!(extension("image/jpeg"), "jpg");
        assert_eq!(category("application/x-thing"), "other");
        assert_eq!(extension("application/x-thing"), "bin");
        assert!(is_textual("text/x-rust"));
        assert!(!is_textual("image/png"));
    }
}
