use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use log::error;
use thiserror::Error;
use tunedir_core::errors::{LibraryError, PathError};

/// Errors that end a request.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Covers missing files, missing covers, and identifiers that don't stay inside the
    /// music root. Clients can't tell these apart.
    #[error("Not found")]
    NotFound,
    #[error(transparent)]
    Library(#[from] LibraryError),
    #[error("Worker task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl From<PathError> for ApiError {
    #[inline]
    fn from(_: PathError) -> Self {
        Self::NotFound
    }
}

impl IntoResponse for ApiError {
    #[inline]
    fn into_response(self) -> Response {
        match self {
            Self::NotFound => (StatusCode::NOT_FOUND, "Not found").into_response(),
            Self::Library(e) => {
                error!("{e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Music library unavailable",
                )
                    .into_response()
            }
            Self::Task(e) => {
                error!("{e}");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
            }
        }
    }
}
