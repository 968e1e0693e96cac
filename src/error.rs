use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::content::ContentError;
use crate::engagement::EngageError;
use crate::notify::{NotifyError, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found")]
    NotFound,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden")]
    Forbidden,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

impl From<NotifyError> for AppError {
    fn from(err: NotifyError) -> Self {
        match err {
            NotifyError::NotFound(_) => AppError::NotFound,
            NotifyError::InvalidTarget(msg) | NotifyError::InvalidVerb(msg) => {
                AppError::BadRequest(msg)
            }
            NotifyError::Storage(e) => AppError::Store(e),
        }
    }
}

impl From<EngageError> for AppError {
    fn from(err: EngageError) -> Self {
        match err {
            EngageError::NotFound(_) => AppError::NotFound,
            EngageError::Storage(e) => AppError::Store(e),
        }
    }
}

impl From<ContentError> for AppError {
    fn from(err: ContentError) -> Self {
        match err {
            ContentError::NotFound(_) => AppError::NotFound,
            ContentError::Forbidden(_) => AppError::Forbidden,
            ContentError::Invalid(msg) => AppError::BadRequest(msg),
            ContentError::Storage(e) => AppError::Store(e),
            ContentError::Notify(e) => e.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound => (StatusCode::NOT_FOUND, "Not found".to_string()),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "Forbidden".to_string()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Store(e) => {
                tracing::error!(transient = e.is_transient(), "Storage error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, message).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
