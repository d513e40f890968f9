//! Filesystem routes
//!
//! Every path not claimed by the book routes maps onto the content root:
//! directories get a listing, files are streamed with a guessed type.

use std::path::Path as FsPath;

use axum::{
    extract::State,
    http::{header::RANGE, HeaderMap, Uri},
    response::{Html, IntoResponse, Response},
};

use crate::error::{AppError, Result};
use crate::html::{self, ListingEntry};
use crate::jail;
use crate::mime;
use crate::state::AppState;
use crate::stream::{self, Payload};

/// GET / and GET /*path
pub async fn serve_path(
    State(state): State<AppState>,
    uri: Uri,
    headers: HeaderMap,
) -> Result<Response> {
    let request_path = uri.path();
    let decoded = urlencoding::decode(request_path)
        .map_err(|_| AppError::BadRequest("Invalid request path".to_string()))?;

    let root = state.root_dir().to_path_buf();
    let requested = decoded.into_owned();
    let path = tokio::task::spawn_blocking(move || jail::confine(&root, &requested)).await??;

    let metadata = tokio::fs::metadata(&path)
        .await
        .map_err(|_| AppError::NotFound(request_path.to_string()))?;

    if metadata.is_dir() {
        let entries = list_dir(&path).await?;
        return Ok(Html(html::render_listing(request_path, &entries)).into_response());
    }
    if metadata.is_file() {
        return serve_file(&path, headers).await;
    }
    Err(AppError::NotFound(request_path.to_string()))
}

async fn list_dir(dir: &FsPath) -> Result<Vec<ListingEntry>> {
    let mut reader = tokio::fs::read_dir(dir).await?;
    let mut entries = Vec::new();

    while let Some(entry) = reader.next_entry().await? {
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        // follows symlinks, unlike DirEntry::metadata
        let Ok(metadata) = tokio::fs::metadata(entry.path()).await else {
            continue;
        };
        entries.push(ListingEntry {
            name,
            is_dir: metadata.is_dir(),
            size: metadata.is_file().then(|| metadata.len()),
        });
    }

    entries.sort_unstable_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

async fn serve_file(path: &FsPath, headers: HeaderMap) -> Result<Response> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut payload = Payload::from_path(path, "").await?;

    payload.content_type = match mime::from_extension(&name) {
        Some(by_name) => by_name,
        None => {
            let source = payload.source.clone();
            let head_len = source.len().min(mime::SNIFF_LEN) as usize;
            let head = tokio::task::spawn_blocking(move || source.read_range(0, head_len)).await??;
            mime::guess_type(&name, &head)
        }
    };

    Ok(stream::respond(payload, headers.get(RANGE)))
}
