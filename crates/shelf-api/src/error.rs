//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Maps storage and chart decoding errors to HTTP status codes and returns
//! JSON error response bodies with a machine-readable code and message.
//! Internal error details are never exposed in responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::cache::CacheError;
use shelf_storage::StorageError;

/// Structured JSON error response body.
///
/// All error responses use this format for consistency across the API
/// surface.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "NOT_FOUND", "CONFLICT").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

/// Application-level error type that implements [`IntoResponse`] for Axum.
#[derive(Error, Debug)]
pub enum AppError {
    /// Chart, version, or object lookup miss (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Client-supplied content could not be decoded, or a required upload
    /// field was missing (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Overwrite disallowed on the multipart upload path (409).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Overwrite disallowed on the raw upload path. The classic binary
    /// upload route has always reported this as a server error rather than
    /// a 409, and clients depend on that.
    #[error("{0} already exists")]
    AlreadyExists(String),

    /// Download requested for a filename that is neither a chart package
    /// nor a provenance file (500, matching the classic route contract).
    #[error("unsupported file extension: {0}")]
    UnsupportedExtension(String),

    /// Backend or serialization failure (500). The message is logged but
    /// not returned to the client.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Return the HTTP status code and machine-readable error code.
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            Self::AlreadyExists(_) => (StatusCode::INTERNAL_SERVER_ERROR, "ALREADY_EXISTS"),
            Self::UnsupportedExtension(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "UNSUPPORTED_EXTENSION")
            }
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        // Never expose internal error messages to clients.
        let message = match &self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        };

        match &self {
            Self::Internal(_) => tracing::error!(error = %self, "internal server error"),
            Self::UnsupportedExtension(_) | Self::AlreadyExists(_) => {
                tracing::warn!(error = %self, "request rejected")
            }
            _ => {}
        }

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Convert storage errors on direct backend access (downloads, deletes).
impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(path) => Self::NotFound(format!("object {path} not found")),
            StorageError::Io(msg) => Self::Internal(msg),
        }
    }
}

/// Convert cache engine errors.
///
/// Storage and serialization failures inside a reconcile or incremental
/// update are server errors regardless of kind — by the time the engine
/// runs, client input has already been validated.
impl From<CacheError> for AppError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::NotFound(_) => Self::NotFound(err.to_string()),
            CacheError::Storage(inner) => Self::Internal(inner.to_string()),
            CacheError::Chart(inner) => Self::Internal(inner.to_string()),
        }
    }
}
