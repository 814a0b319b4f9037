//! Server error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Errors surfaced by request handlers.
#[derive(Debug, Error)]
pub(crate) enum ServerError {
    /// Requested file does not exist under the document root.
    #[error("not found")]
    NotFound,
    /// Request path tried to escape the document root.
    #[error("forbidden path")]
    PathTraversal,
    /// Static files are read-only.
    #[error("method not allowed")]
    MethodNotAllowed,
    /// Reading the file failed for a reason other than absence.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::PathTraversal => StatusCode::FORBIDDEN,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::Io(ref error) => {
                tracing::error!(%error, "static file read failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, self.to_string()).into_response()
    }
}
