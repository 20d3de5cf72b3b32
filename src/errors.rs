//! Request-level error taxonomy shared by all handlers and services.
//!
//! Every failure is converted to the HTTP shape here; nothing propagates past
//! the request boundary unhandled. Non-2xx bodies carry
//! `{ "errorDescription": ... }`, except `Unauthorized` which keeps the
//! legacy plain-text body.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed or missing required input (400).
    #[error("{0}")]
    Validation(String),

    /// Bad, missing or expired credentials (401). Deliberately
    /// undifferentiated to avoid username enumeration.
    #[error("Incorrect login details")]
    Authentication,

    /// Authenticated but not the resource owner (401).
    #[error("Unauthorized")]
    Unauthorized,

    /// Resource absent (404). Carries the full user-facing message,
    /// e.g. "Posting not found".
    #[error("{0}")]
    NotFound(&'static str),

    /// Per-posting image cap reached (400).
    #[error("Posting already has the maximum number of images")]
    ImageLimit,

    /// Duplicate username at registration (400).
    #[error("User with that username already exists")]
    Conflict,

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    /// Unexpected hashing/signing failure (500).
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::ImageLimit | Self::Conflict => StatusCode::BAD_REQUEST,
            Self::Authentication | Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Sqlx(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Ownership rejections keep the historical plain-text body.
        if matches!(self, Self::Unauthorized) {
            return (status, "Unauthorized").into_response();
        }

        let description = match &self {
            Self::Sqlx(err) => {
                tracing::error!("database error: {}", err);
                "Unknown error occurred".to_string()
            }
            Self::Internal(msg) => {
                tracing::error!("internal error: {}", msg);
                "Unknown error occurred".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(json!({ "errorDescription": description }))).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::internal(err.to_string())
    }
}

/// Return true if a SQLx error indicates a unique constraint violation.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err) if db_err.message().to_ascii_lowercase().contains("unique")
    )
}

/// Return true if a SQLx error indicates a CHECK constraint violation.
pub fn is_check_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err) if db_err.message().to_ascii_lowercase().contains("check")
    )
}
