//! Reader-view rewriting of book documents using lol_html
//!
//! Links inside a chapter point at other archive entries relative to the
//! chapter. They are rewritten into the server's `/epub_read/` namespace so
//! the browser can follow them, and links that would leave the book are
//! dropped.

use lol_html::html_content::ContentType;
use lol_html::{element, rewrite_str, RewriteStrSettings};

use crate::epub::href;

/// Elements that may carry a link to another book resource
const LINKING_ELEMENTS: &str =
    "a, area, link, img, image, script, source, video, audio, track, iframe, embed, object";

const LINK_ATTRIBUTES: [&str; 5] = ["href", "src", "xlink:href", "poster", "data"];

/// Errors from HTML rewriting
#[derive(Debug, thiserror::Error)]
pub enum RewriteError {
    #[error("Rewrite error: {0}")]
    Rewrite(String),
}

/// Where a rewritten link should point
#[derive(Debug, PartialEq, Eq)]
pub enum LinkAction {
    Keep,
    Replace(String),
    Remove,
}

/// Link context of one document inside one book
#[derive(Debug, Clone, Copy)]
pub struct ReaderLinks<'a> {
    /// URL-safe book id
    pub book_id: &'a str,
    /// Archive path of the document being rewritten
    pub doc_path: &'a str,
}

impl ReaderLinks<'_> {
    /// Reader URL of an archive path
    pub fn url_for(&self, path: &str) -> String {
        reader_url(self.book_id, path)
    }

    /// Decide what happens to a link found in the document
    pub fn map(&self, value: &str) -> LinkAction {
        let value = value.trim();
        if value.is_empty()
            || value.starts_with('#')
            || value.starts_with("//")
            || href::has_scheme(value)
        {
            return LinkAction::Keep;
        }

        match href::resolve_in(self.doc_path, value) {
            Some(target) => {
                let mut url = self.url_for(&target.path);
                if let Some(fragment) = target.fragment {
                    url.push('#');
                    url.push_str(&fragment);
                }
                LinkAction::Replace(url)
            }
            None => LinkAction::Remove,
        }
    }
}

/// `/epub_read/{id}/{path}` with each path segment percent-encoded
pub fn reader_url(book_id: &str, path: &str) -> String {
    format!("/epub_read/{}/{}", book_id, href::encode_path(path))
}

/// Prev / Table of Contents / Next bar shown around spine documents
#[derive(Debug, Clone, Default)]
pub struct NavBar {
    pub prev: Option<String>,
    pub toc: Option<String>,
    pub next: Option<String>,
}

impl NavBar {
    pub fn to_html(&self) -> String {
        let mut out = String::from(
            r#"<div style="display: flex; justify-content: space-between; align-items: center;">"#,
        );
        push_nav_link(&mut out, self.prev.as_deref(), "Prev");
        push_nav_link(&mut out, self.toc.as_deref(), "Table of Contents");
        push_nav_link(&mut out, self.next.as_deref(), "Next");
        out.push_str("</div>");
        out
    }
}

fn push_nav_link(out: &mut String, url: Option<&str>, label: &str) {
    match url {
        Some(url) => out.push_str(&format!(
            r#"<a href="{}">{}</a>"#,
            html_escape::encode_double_quoted_attribute(url),
            label
        )),
        None => out.push_str(&format!(r#"<span style="color:grey">{}</span>"#, label)),
    }
}

/// Rewrite links in `html` and, when given, place the nav bar at the top
/// and bottom of `<body>`.
pub fn decorate(
    html: &str,
    links: ReaderLinks<'_>,
    nav: Option<&NavBar>,
) -> Result<String, RewriteError> {
    let bar = nav.map(NavBar::to_html);

    let mut handlers = vec![element!(LINKING_ELEMENTS, move |el| {
        for attr in LINK_ATTRIBUTES {
            let Some(value) = el.get_attribute(attr) else {
                continue;
            };
            match links.map(&value) {
                LinkAction::Keep => {}
                LinkAction::Replace(url) => el.set_attribute(attr, &url)?,
                LinkAction::Remove => el.remove_attribute(attr),
            }
        }
        Ok(())
    })];

    if let Some(bar) = bar.as_deref() {
        handlers.push(element!("body", move |el| {
            el.prepend(bar, ContentType::Html);
            el.append(bar, ContentType::Html);
            Ok(())
        }));
    }

    let rewritten = rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: handlers,
            ..RewriteStrSettings::default()
        },
    )
    .map_err(|e| RewriteError::Rewrite(e.to_string()));
    rewritten
}
