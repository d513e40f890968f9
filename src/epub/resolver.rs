//! Mapping requests onto book resources
//!
//! Request paths come straight from the URL, so they are checked before
//! anything is read from the archive: a path that could leave the book is
//! refused outright instead of being normalized.

use std::sync::Arc;

use super::book::Book;
use super::error::{EpubError, EpubResult};
use super::href;
use crate::mime;
use crate::stream::Payload;

/// What a client asked for inside a book
#[derive(Debug, Clone, Copy)]
pub enum ResourceRequest<'a> {
    /// Spine item by position
    Chapter(usize),
    /// Archive path relative to the book root
    Path(&'a str),
}

/// A request pinned to an archive entry
#[derive(Debug, Clone)]
pub struct ResolvedResource {
    pub book: Arc<Book>,
    /// Archive path
    pub path: String,
    pub mime: String,
    /// Uncompressed length
    pub len: u64,
    /// Spine position when the resource is a reading-order document
    pub chapter: Option<usize>,
}

impl ResolvedResource {
    /// Body source for the streamer. Blocking for compressed entries.
    pub fn payload(&self) -> EpubResult<Payload> {
        let source = self.book.archive().source(&self.path)?;
        Ok(Payload::new(source, self.mime.clone()))
    }

    pub fn is_html(&self) -> bool {
        mime::is_html(&self.mime)
    }
}

/// Validate an untrusted book-relative path.
///
/// Returns the normalized archive path. `..` segments, absolute forms,
/// backslashes, NUL and URL schemes are refused whether or not they would
/// stay inside the book.
pub fn check_request_path(requested: &str) -> EpubResult<String> {
    let escapes = requested.starts_with('/')
        || requested.contains('\\')
        || requested.contains('\0')
        || href::has_scheme(requested)
        || requested.split('/').any(|segment| segment == "..");
    if escapes {
        return Err(EpubError::OutOfBookAccess(requested.to_string()));
    }

    let normalized = requested
        .split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .collect::<Vec<_>>()
        .join("/");
    if normalized.is_empty() {
        return Err(EpubError::NotFound("empty resource path".to_string()));
    }
    Ok(normalized)
}

/// Resolve a request against a book. May read a few leading bytes of the
/// entry to sniff its type, so call it off the async executor.
pub fn resolve(book: &Arc<Book>, request: ResourceRequest<'_>) -> EpubResult<ResolvedResource> {
    let path = match request {
        ResourceRequest::Chapter(index) => book
            .chapter_path(index)
            .map(str::to_string)
            .ok_or_else(|| EpubError::NotFound(format!("chapter {}", index)))?,
        ResourceRequest::Path(requested) => match check_request_path(requested) {
            Ok(path) => path,
            Err(e @ EpubError::OutOfBookAccess(_)) => {
                tracing::warn!(
                    book = %book.path().display(),
                    requested,
                    "refused request outside the book"
                );
                return Err(e);
            }
            Err(e) => return Err(e),
        },
    };

    let entry = book
        .archive()
        .entry(&path)
        .filter(|e| !e.is_dir)
        .ok_or_else(|| EpubError::NotFound(path.clone()))?;
    let len = entry.size;

    let declared = book
        .structure()
        .resource_by_path(&path)
        .and_then(|r| r.media_type.clone());
    let mime = match declared {
        Some(mime) => mime,
        None => sniff_type(book, &path, len),
    };

    Ok(ResolvedResource {
        chapter: book.structure().chapter_index_of(&path),
        book: Arc::clone(book),
        path,
        mime,
        len,
    })
}

fn sniff_type(book: &Book, path: &str, len: u64) -> String {
    if let Some(by_name) = mime::from_extension(path) {
        return by_name;
    }
    let head = book
        .archive()
        .read_entry(path, Some(0..len.min(mime::SNIFF_LEN)))
        .unwrap_or_default();
    mime::guess_type(path, &head)
}
