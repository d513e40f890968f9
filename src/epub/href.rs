//! Archive path arithmetic
//!
//! Archive paths are `/`-separated, carry no leading slash and contain no
//! `.` or `..` segments. Every href found in a book (manifest, nav, NCX,
//! chapter markup) is resolved against the directory of the document that
//! contains it.

use std::borrow::Cow;

/// An href resolved to an archive path plus its fragment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Href {
    pub path: String,
    pub fragment: Option<String>,
}

/// Directory part of an archive path, `""` for top-level entries
pub fn parent_dir(path: &str) -> &str {
    path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

/// Last segment of an archive path
pub fn file_name(path: &str) -> &str {
    path.rsplit_once('/').map(|(_, name)| name).unwrap_or(path)
}

/// Split an href into the part before `?`/`#` and the fragment
pub fn split_href(href: &str) -> (&str, Option<&str>) {
    let (before, fragment) = match href.split_once('#') {
        Some((before, fragment)) => (before, Some(fragment)),
        None => (href, None),
    };
    let path = before.split_once('?').map(|(p, _)| p).unwrap_or(before);
    (path, fragment)
}

/// Whether the href starts with a URL scheme such as `http:` or `mailto:`
pub fn has_scheme(href: &str) -> bool {
    let Some((scheme, _)) = href.split_once(':') else {
        return false;
    };
    let mut chars = scheme.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {
            chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        _ => false,
    }
}

/// Percent-decode an href path, keeping the raw text if it is not UTF-8
pub fn decode(raw: &str) -> Cow<'_, str> {
    match urlencoding::decode(raw) {
        Ok(decoded) => decoded,
        Err(_) => Cow::Borrowed(raw),
    }
}

/// Join `relative` onto `base_dir`, folding `.` and `..`.
///
/// A leading `/` anchors at the archive root. Returns `None` when the path
/// climbs above the root.
pub fn join(base_dir: &str, relative: &str) -> Option<String> {
    let mut segments: Vec<&str> = if relative.starts_with('/') {
        Vec::new()
    } else {
        base_dir.split('/').filter(|s| !s.is_empty()).collect()
    };

    for segment in relative.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            other => segments.push(other),
        }
    }

    Some(segments.join("/"))
}

/// Resolve an href found inside the document at `doc_path`.
///
/// Fragment-only hrefs point back at the document itself. Schemed URLs and
/// hrefs escaping the archive yield `None`.
pub fn resolve_in(doc_path: &str, href: &str) -> Option<Href> {
    let href = href.trim();
    if has_scheme(href) || href.starts_with("//") {
        return None;
    }

    let (raw_path, fragment) = split_href(href);
    let path = if raw_path.is_empty() {
        doc_path.to_string()
    } else {
        join(parent_dir(doc_path), &decode(raw_path))?
    };
    if path.is_empty() {
        return None;
    }

    Some(Href {
        path,
        fragment: fragment.filter(|f| !f.is_empty()).map(str::to_string),
    })
}

/// Percent-encode each segment of an archive path for use in a URL
pub fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
