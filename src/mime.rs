//! Content-type guessing
//!
//! Used for plain files and for book resources whose manifest entry has no
//! media-type. Order: file extension, magic bytes, UTF-8 heuristic,
//! `application/octet-stream`.

use std::path::Path;

/// How many leading bytes are worth sniffing
pub const SNIFF_LEN: u64 = 512;

const OCTET_STREAM: &str = "application/octet-stream";

/// Extensions common in books that the registry does not know
fn book_extension(ext: &str) -> Option<&'static str> {
    match ext {
        "ncx" => Some("application/x-dtbncx+xml"),
        "opf" => Some("application/oebps-package+xml"),
        "smil" => Some("application/smil+xml"),
        "otf" => Some("font/otf"),
        "ttf" => Some("font/ttf"),
        "woff" => Some("font/woff"),
        "woff2" => Some("font/woff2"),
        _ => None,
    }
}

/// MIME type implied by the file name alone
pub fn from_extension(name: &str) -> Option<String> {
    let ext = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)?;
    if let Some(known) = book_extension(&ext) {
        return Some(known.to_string());
    }
    mime_guess::from_ext(&ext)
        .first()
        .filter(|m| m.essence_str() != OCTET_STREAM)
        .map(|m| m.essence_str().to_string())
}

/// Guess a MIME type from the file name and its first bytes.
///
/// Pass `&[]` as `sniffed` to skip content checks.
pub fn guess_type(name: &str, sniffed: &[u8]) -> String {
    if let Some(by_name) = from_extension(name) {
        return by_name;
    }

    if !sniffed.is_empty() {
        if let Some(kind) = infer::get(sniffed) {
            return kind.mime_type().to_string();
        }
        if std::str::from_utf8(sniffed).is_ok() {
            return "text/plain".to_string();
        }
    }

    OCTET_STREAM.to_string()
}

/// Whether the type is an HTML flavour worth decorating
pub fn is_html(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    essence == "text/html" || essence == "application/xhtml+xml"
}
