//! Error handling module for the tracker.
//!
//! Provides the error taxonomy shared by the blob store, the mutator and the
//! collection APIs, with mapping to HTTP status codes and response envelopes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error codes as constants to avoid stringly-typed errors.
pub mod codes {
    pub const UNAUTHORIZED: &str = "UNAUTHORIZED";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const DUPLICATE_ID: &str = "DUPLICATE_ID";
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    pub const VERSION_MISMATCH: &str = "VERSION_MISMATCH";
    pub const DECODE_ERROR: &str = "DECODE_ERROR";
    pub const TRANSPORT_ERROR: &str = "TRANSPORT_ERROR";
    pub const CACHE_ERROR: &str = "CACHE_ERROR";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
}

/// Application error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// The credential was rejected by the provider, or none is present
    #[error("{0}")]
    Auth(String),
    /// Version token mismatch on a remote write
    #[error("{0}")]
    Conflict(String),
    /// Entity or blob absent when the operation required it
    #[error("{0}")]
    NotFound(String),
    /// Create collided with an existing id
    #[error("{0}")]
    DuplicateId(String),
    /// Remote content is not the JSON shape we expect
    #[error("{0}")]
    Decode(String),
    /// Any other non-success response from the provider
    #[error("transport error{}: {message}", http_suffix(.status))]
    Transport {
        status: Option<u16>,
        message: String,
    },
    /// Request failed field validation
    #[error("{0}")]
    Validation(String),
    /// Local mirror cache / session storage failure
    #[error("{0}")]
    Cache(String),
    /// Internal error
    #[error("{0}")]
    Internal(String),
}

fn http_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

impl AppError {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::DuplicateId(_) => StatusCode::CONFLICT,
            AppError::Decode(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Transport { .. } => StatusCode::BAD_GATEWAY,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Cache(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Auth(_) => codes::UNAUTHORIZED,
            AppError::Conflict(_) => codes::VERSION_MISMATCH,
            AppError::NotFound(_) => codes::NOT_FOUND,
            AppError::DuplicateId(_) => codes::DUPLICATE_ID,
            AppError::Decode(_) => codes::DECODE_ERROR,
            AppError::Transport { .. } => codes::TRANSPORT_ERROR,
            AppError::Validation(_) => codes::VALIDATION_ERROR,
            AppError::Cache(_) => codes::CACHE_ERROR,
            AppError::Internal(_) => codes::INTERNAL_ERROR,
        }
    }

    /// Get the error message.
    pub fn message(&self) -> String {
        match self {
            AppError::Transport { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Cache database error: {:?}", err);
        AppError::Cache(format!("Cache database error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        tracing::error!("JSON error: {:?}", err);
        AppError::Decode(format!("JSON error: {}", err))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        tracing::error!("HTTP error: {:?}", err);
        AppError::Transport {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}

/// Error details in the response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Error response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorDetails,
}

impl ErrorResponse {
    pub fn new(error: &AppError) -> Self {
        let details = match error {
            AppError::Transport { status, .. } => Some(serde_json::json!({ "status": status })),
            _ => None,
        };

        Self {
            success: false,
            error: ErrorDetails {
                code: error.error_code().to_string(),
                message: error.message(),
                details,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse::new(&self);
        (status, Json(body)).into_response()
    }
}
