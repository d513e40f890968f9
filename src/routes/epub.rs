//! EPUB routes
//!
//! Books are addressed by an id: the URL-safe, unpadded base64 of the book's
//! path relative to the content root.
//!
//! - `GET /epub_toc/*path`: table of contents page
//! - `GET /epub_read/:id/*inner`: reader view of a book resource
//! - `GET /epub_cont/:id/*inner`: raw resource bytes
//! - `GET /epub_chapter/:id/:index`: redirect to a spine item

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header::RANGE, HeaderMap},
    response::{Html, IntoResponse, Redirect, Response},
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use bytes::Bytes;

use crate::epub::{self, href, Book, ResolvedResource, ResourceRequest};
use crate::error::{AppError, Result};
use crate::html::{self, NavBar, ReaderLinks};
use crate::jail;
use crate::state::AppState;
use crate::stream::{self, ByteSource, Payload};

/// Id of the book at a root-relative path
pub fn book_id(relative: &str) -> String {
    URL_SAFE_NO_PAD.encode(relative)
}

fn decode_book_id(id: &str) -> Result<String> {
    let bytes = URL_SAFE_NO_PAD
        .decode(id)
        .map_err(|_| AppError::BadRequest("Invalid book id".to_string()))?;
    String::from_utf8(bytes).map_err(|_| AppError::BadRequest("Invalid book id".to_string()))
}

/// A book together with its normalized root-relative path
struct OpenedBook {
    relative: String,
    book: Arc<Book>,
}

impl OpenedBook {
    fn id(&self) -> String {
        book_id(&self.relative)
    }
}

async fn open_book(state: &AppState, requested: &str) -> Result<OpenedBook> {
    let relative = jail::normalize(requested)?;
    if relative.is_empty() {
        return Err(AppError::NotFound("no book path".to_string()));
    }

    let root = state.root_dir().to_path_buf();
    let confined = relative.clone();
    let path = tokio::task::spawn_blocking(move || jail::confine(&root, &confined)).await??;

    let book = state.book_cache().get_or_build(&path).await?;
    Ok(OpenedBook { relative, book })
}

/// Refuse an inner path that leaves the book before the archive is touched
fn check_inner(relative: &str, inner: &str) -> Result<()> {
    match epub::resolver::check_request_path(inner) {
        Err(e @ epub::EpubError::OutOfBookAccess(_)) => {
            tracing::warn!(book = relative, requested = inner, "refused request outside the book");
            Err(e.into())
        }
        _ => Ok(()),
    }
}

/// GET /epub_toc/*path
pub async fn toc(State(state): State<AppState>, Path(path): Path<String>) -> Result<Html<String>> {
    let opened = open_book(&state, &path).await?;
    let page = html::render_toc(&opened.book.title(), &opened.id(), opened.book.toc());
    Ok(Html(page))
}

/// GET /epub_read/:id/*inner
pub async fn read(
    State(state): State<AppState>,
    Path((id, inner)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Response> {
    let relative = decode_book_id(&id)?;
    check_inner(&relative, &inner)?;
    let opened = open_book(&state, &relative).await?;

    let payload = tokio::task::spawn_blocking(move || -> Result<Payload> {
        let resolved = epub::resolve(&opened.book, ResourceRequest::Path(&inner))?;
        if !resolved.is_html() {
            return Ok(resolved.payload()?);
        }
        let page = opened
            .book
            .rendered_page(&resolved.path, || reader_page(&opened, &resolved))?;
        Ok(Payload::new(ByteSource::Memory(page), resolved.mime.clone()))
    })
    .await??;

    Ok(stream::respond(payload, headers.get(RANGE)))
}

/// Document with links rewritten into the reader namespace and, for spine
/// items, the navigation bar. Documents that are not UTF-8 are served as is.
fn reader_page(opened: &OpenedBook, resolved: &ResolvedResource) -> Result<Bytes> {
    let book = &opened.book;
    let id = opened.id();
    let raw = book.archive().read_entry(&resolved.path, None)?;
    let Ok(text) = std::str::from_utf8(&raw) else {
        tracing::debug!(path = %resolved.path, "document is not UTF-8, skipping decoration");
        return Ok(raw.clone());
    };

    let nav = resolved.chapter.map(|index| {
        let (prev, next) = book.neighbours(index);
        NavBar {
            prev: prev.map(|p| html::reader_url(&id, p)),
            toc: Some(format!("/epub_toc/{}", href::encode_path(&opened.relative))),
            next: next.map(|p| html::reader_url(&id, p)),
        }
    });
    let links = ReaderLinks {
        book_id: &id,
        doc_path: &resolved.path,
    };

    let page = html::decorate(text, links, nav.as_ref())?;
    Ok(Bytes::from(page))
}

/// GET /epub_cont/:id/*inner
pub async fn content(
    State(state): State<AppState>,
    Path((id, inner)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Response> {
    let relative = decode_book_id(&id)?;
    check_inner(&relative, &inner)?;
    let opened = open_book(&state, &relative).await?;

    let payload = tokio::task::spawn_blocking(move || -> Result<Payload> {
        let resolved = epub::resolve(&opened.book, ResourceRequest::Path(&inner))?;
        Ok(resolved.payload()?)
    })
    .await??;

    Ok(stream::respond(payload, headers.get(RANGE)))
}

/// GET /epub_chapter/:id/:index
pub async fn chapter(
    State(state): State<AppState>,
    Path((id, index)): Path<(String, usize)>,
) -> Result<Response> {
    let relative = decode_book_id(&id)?;
    let opened = open_book(&state, &relative).await?;

    let path = opened
        .book
        .chapter_path(index)
        .ok_or_else(|| AppError::NotFound(format!("chapter {}", index)))?;
    Ok(Redirect::to(&html::reader_url(&opened.id(), path)).into_response())
}
