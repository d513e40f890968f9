//! Directory listing page

/// One row of a directory listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    pub name: String,
    pub is_dir: bool,
    /// File size; `None` for directories
    pub size: Option<u64>,
}

/// Human-readable size with two decimals, e.g. `1.50 KB`
pub fn format_size(size: u64) -> String {
    const UNITS: [&str; 6] = ["B", "KB", "MB", "GB", "TB", "PB"];
    let mut size = size as f64;
    let mut unit = 0;

    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    format!("{:.2} {}", size, UNITS[unit])
}

/// Render a listing of `entries` found at the URL path `request_path`.
///
/// Entries are expected sorted. EPUB files get a `[Read]` link to their
/// table of contents.
pub fn render_listing(request_path: &str, entries: &[ListingEntry]) -> String {
    let mut base = request_path.to_string();
    if !base.ends_with('/') {
        base.push('/');
    }

    let mut out = String::from("<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"/>");
    out.push_str(&format!(
        "<title>{}</title></head><body>",
        html_escape::encode_text(request_path)
    ));

    for entry in entries {
        let url = format!("{}{}", base, urlencoding::encode(&entry.name));
        let name = html_escape::encode_text(&entry.name);

        out.push_str("<div>");
        out.push_str(if entry.is_dir { "[+&nbsp;" } else { "[-&nbsp;" });
        out.push_str(&format!(r#"<a href="{}">{}</a>]"#, url, name));
        if let Some(size) = entry.size {
            out.push_str(&format!("&nbsp;[{}]", format_size(size)));
        }
        if !entry.is_dir && entry.name.to_ascii_lowercase().ends_with(".epub") {
            out.push_str(&format!(r#"&nbsp;[<a href="/epub_toc{}">Read</a>]"#, url));
        }
        out.push_str("</div>");
    }

    out.push_str("</body></html>");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0.00 B");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.00 MB");
    }

    #[test]
    fn test_listing_rows() {
        let entries = vec![
            ListingEntry {
                name: "books".into(),
                is_dir: true,
                size: None,
            },
            ListingEntry {
                name: "my book.epub".into(),
                is_dir: false,
                size: Some(2048),
            },
        ];
        let page = render_listing("/shelf", &entries);
        assert!(page.contains(r#"<div>[+&nbsp;<a href="/shelf/books">books</a>]</div>"#));
        assert!(page.contains(
            r#"[-&nbsp;<a href="/shelf/my%20book.epub">my book.epub</a>]&nbsp;[2.00 KB]&nbsp;[<a href="/epub_toc/shelf/my%20book.epub">Read</a>]"#
        ));
    }
}
