//! Route modules for shelfserve

pub mod epub;
pub mod files;

use axum::{routing::get, Router};

use crate::state::AppState;

/// All routes; the filesystem catch-all comes last
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/epub_toc/*path", get(epub::toc))
        .route("/epub_read/:id/*inner", get(epub::read))
        .route("/epub_cont/:id/*inner", get(epub::content))
        .route("/epub_chapter/:id/:index", get(epub::chapter))
        .route("/", get(files::serve_path))
        .route("/*path", get(files::serve_path))
}
