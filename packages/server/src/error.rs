use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sea_orm::DbErr;
use serde::Serialize;

use crate::identity::IdentityError;
use crate::services::ImageError;

/// Structured error response returned by all endpoints on failure.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    /// Machine-readable error code. One of: `VALIDATION_ERROR`, `TOKEN_MISSING`,
    /// `TOKEN_INVALID`, `INVALID_CREDENTIALS`, `NOT_FOUND`, `DUPLICATE_CONTENT`,
    /// `PARTIAL_CLEANUP`, `IDENTITY_UNAVAILABLE`, `INTERNAL_ERROR`.
    #[schema(example = "DUPLICATE_CONTENT")]
    pub code: &'static str,
    /// Human-readable error description.
    #[schema(example = "This image has already been uploaded")]
    pub message: String,
}

/// Application-level error type.
#[derive(Debug)]
pub enum AppError {
    Validation(String),
    TokenMissing,
    TokenInvalid,
    InvalidCredentials,
    NotFound(String),
    /// Content with this hash is already stored for the user.
    DuplicateContent,
    /// The record is gone but its object could not be removed.
    PartialCleanup,
    IdentityUnavailable,
    Internal(String),
}

impl AppError {
    fn status_and_body(self) -> (StatusCode, ErrorBody) {
        match self {
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    code: "VALIDATION_ERROR",
                    message: msg,
                },
            ),
            AppError::TokenMissing => (
                StatusCode::UNAUTHORIZED,
                ErrorBody {
                    code: "TOKEN_MISSING",
                    message: "Authentication required".into(),
                },
            ),
            AppError::TokenInvalid => (
                StatusCode::UNAUTHORIZED,
                ErrorBody {
                    code: "TOKEN_INVALID",
                    message: "Invalid or expired token".into(),
                },
            ),
            AppError::InvalidCredentials => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    code: "INVALID_CREDENTIALS",
                    message: "Invalid email or password".into(),
                },
            ),
            AppError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                ErrorBody {
                    code: "NOT_FOUND",
                    message: msg,
                },
            ),
            AppError::DuplicateContent => (
                StatusCode::CONFLICT,
                ErrorBody {
                    code: "DUPLICATE_CONTENT",
                    message: "This image has already been uploaded".into(),
                },
            ),
            AppError::PartialCleanup => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody {
                    code: "PARTIAL_CLEANUP",
                    message: "Image record was deleted but its file could not be removed".into(),
                },
            ),
            AppError::IdentityUnavailable => (
                StatusCode::BAD_GATEWAY,
                ErrorBody {
                    code: "IDENTITY_UNAVAILABLE",
                    message: "Identity service is unavailable".into(),
                },
            ),
            AppError::Internal(detail) => {
                tracing::error!("Internal error: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody {
                        code: "INTERNAL_ERROR",
                        message: "An unexpected error occurred".into(),
                    },
                )
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = self.status_and_body();
        (status, Json(body)).into_response()
    }
}

impl From<DbErr> for AppError {
    fn from(err: DbErr) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<ImageError> for AppError {
    fn from(err: ImageError) -> Self {
        match err {
            ImageError::InvalidName(msg)
            | ImageError::InvalidHash(msg)
            | ImageError::InvalidSize(msg)
            | ImageError::InvalidPrefix(msg) => AppError::Validation(msg),
            ImageError::DuplicateContent => AppError::DuplicateContent,
            ImageError::NotFound => AppError::NotFound("Image not found".into()),
            ImageError::StoreFailure(e) => AppError::Internal(format!("Store failure: {e}")),
            ImageError::StorageFailure(e) => AppError::Internal(format!("Storage failure: {e}")),
            ImageError::PartialCleanup { key, source } => {
                tracing::error!(
                    partial_cleanup = true,
                    key = %key,
                    error = %source,
                    "Object left behind after record deletion"
                );
                AppError::PartialCleanup
            }
        }
    }
}

impl From<IdentityError> for AppError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::InvalidCredentials => AppError::InvalidCredentials,
            IdentityError::Unavailable(detail) => {
                tracing::error!("Identity service error: {}", detail);
                AppError::IdentityUnavailable
            }
        }
    }
}
