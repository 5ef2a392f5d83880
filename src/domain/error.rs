//! API error taxonomy.
//!
//! Every failure a handler can surface maps to a stable HTTP status and a
//! machine-readable kind. Infrastructure faults (Postgres, Redis) collapse
//! into `StorageUnavailable`, which callers may retry with backoff; all
//! other kinds are terminal for the request. Internal details are logged,
//! never serialized to clients.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

type Source = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("device not registered")]
    DeviceNotRegistered,

    #[error("invalid or expired QR token")]
    InvalidOrExpiredToken,

    #[error("selfie verification failed")]
    SelfieVerificationFailed,

    #[error("attendance already marked for this class today")]
    DuplicateAttendance,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("{0}")]
    Validation(String),

    #[error("storage unavailable")]
    StorageUnavailable(#[source] Source),

    #[error("internal error")]
    Internal(#[source] Source),
}

/// JSON body returned for every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    // ---
    pub error: &'static str,
    pub message: String,
}

impl ApiError {
    /// Machine-readable kind, stable across releases.
    pub fn kind(&self) -> &'static str {
        // ---
        match self {
            ApiError::DeviceNotRegistered => "DeviceNotRegistered",
            ApiError::InvalidOrExpiredToken => "InvalidOrExpiredToken",
            ApiError::SelfieVerificationFailed => "SelfieVerificationFailed",
            ApiError::DuplicateAttendance => "DuplicateAttendance",
            ApiError::NotFound(_) => "NotFound",
            ApiError::Unauthorized(_) => "Unauthorized",
            ApiError::Validation(_) => "ValidationError",
            ApiError::StorageUnavailable(_) => "StorageUnavailable",
            ApiError::Internal(_) => "InternalError",
        }
    }

    pub fn status(&self) -> StatusCode {
        // ---
        match self {
            ApiError::DeviceNotRegistered
            | ApiError::InvalidOrExpiredToken
            | ApiError::SelfieVerificationFailed
            | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::DuplicateAttendance => StatusCode::CONFLICT,
            ApiError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // ---
        match &self {
            ApiError::StorageUnavailable(source) => {
                tracing::error!("storage fault: {source}");
            }
            ApiError::Internal(source) => {
                tracing::error!("internal error: {source}");
            }
            _ => {}
        }

        let body = ErrorBody {
            error: self.kind(),
            message: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        // ---
        ApiError::StorageUnavailable(err.into())
    }
}

impl From<redis::RedisError> for ApiError {
    fn from(err: redis::RedisError) -> Self {
        // ---
        ApiError::StorageUnavailable(err.into())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        // ---
        ApiError::Internal(err.into())
    }
}

impl From<pbkdf2::password_hash::Error> for ApiError {
    fn from(err: pbkdf2::password_hash::Error) -> Self {
        // ---
        ApiError::Internal(format!("password hash error: {err}").into())
    }
}
