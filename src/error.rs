//! Error types for the shelfserve server

use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::epub::EpubError;
use crate::html::RewriteError;
use crate::jail::JailError;

/// Application-wide result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Book error: {0}")]
    Book(#[from] Arc<EpubError>),

    #[error("Path error: {0}")]
    Jail(#[from] JailError),

    #[error("HTML error: {0}")]
    Rewrite(#[from] RewriteError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<EpubError> for AppError {
    fn from(e: EpubError) -> Self {
        AppError::Book(Arc::new(e))
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(e: tokio::task::JoinError) -> Self {
        AppError::Internal(format!("blocking task failed: {}", e))
    }
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

fn forbidden() -> (StatusCode, &'static str, String) {
    (StatusCode::FORBIDDEN, "forbidden", "Access denied".to_string())
}

fn not_found() -> (StatusCode, &'static str, String) {
    (StatusCode::NOT_FOUND, "not_found", "Resource not found".to_string())
}

fn internal(error_type: &'static str) -> (StatusCode, &'static str, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        error_type,
        "An internal error occurred".to_string(),
    )
}

impl AppError {
    /// Status, error tag and client-facing message
    fn classify(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::NotFound(msg) => {
                tracing::debug!("Not found: {}", msg);
                not_found()
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone()),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                internal("internal_error")
            }
            AppError::Book(e) => match e.as_ref() {
                EpubError::Io(io) => {
                    tracing::error!("IO error reading book: {}", io);
                    internal("io_error")
                }
                EpubError::NotFound(what) | EpubError::EntryNotFound(what) => {
                    tracing::debug!("Not found in book: {}", what);
                    not_found()
                }
                EpubError::OutOfBookAccess(requested) => {
                    tracing::warn!(requested = %requested, "refused access outside the book");
                    forbidden()
                }
                other => {
                    tracing::warn!("Unreadable book: {}", other);
                    (
                        StatusCode::UNPROCESSABLE_ENTITY,
                        "unreadable_book",
                        "cannot open book".to_string(),
                    )
                }
            },
            AppError::Jail(e) => match e {
                JailError::Escape(requested) => {
                    tracing::warn!(requested = %requested, "refused path outside the served root");
                    forbidden()
                }
                JailError::NullByte => (
                    StatusCode::BAD_REQUEST,
                    "bad_request",
                    "Invalid request path".to_string(),
                ),
                JailError::Io(io) => {
                    tracing::error!("IO error resolving path: {}", io);
                    internal("io_error")
                }
            },
            AppError::Rewrite(e) => {
                tracing::error!("HTML rewrite failed: {}", e);
                internal("rewrite_error")
            }
            AppError::Io(e) => {
                tracing::error!("IO error: {}", e);
                internal("io_error")
            }
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Book(e) => match e.as_ref() {
                EpubError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
                EpubError::NotFound(_) | EpubError::EntryNotFound(_) => StatusCode::NOT_FOUND,
                EpubError::OutOfBookAccess(_) => StatusCode::FORBIDDEN,
                _ => StatusCode::UNPROCESSABLE_ENTITY,
            },
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Jail(JailError::Escape(_)) => StatusCode::FORBIDDEN,
            AppError::Jail(JailError::NullByte) => StatusCode::BAD_REQUEST,
            AppError::Jail(JailError::Io(_))
            | AppError::Internal(_)
            | AppError::Rewrite(_)
            | AppError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = self.classify();

        // book and path errors carry filesystem paths; keep them in the log
        let internal_detail = matches!(
            self,
            AppError::Internal(_) | AppError::Io(_) | AppError::Rewrite(_)
        );
        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message,
            details: if cfg!(debug_assertions) && internal_detail {
                Some(self.to_string())
            } else {
                None
            },
        });

        (status, body).into_response()
    }
}
