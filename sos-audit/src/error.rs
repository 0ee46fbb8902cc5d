//! Error types for the audit processor
//!
//! - [`StoreError`]: anything a storage backend can fail with
//! - [`ProcessError`]: invocation-level (fatal) failures, rendered as HTTP 500

use axum::Json;
use axum::response::{IntoResponse, Response};
use http::StatusCode;
use serde::Serialize;
use shared::error::{AppError, ErrorCode};
use thiserror::Error;
use uuid::Uuid;

use crate::config::ConfigError;

/// Storage backend error
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    /// Non-2xx answer from the REST backend
    #[error("Backend returned {status}: {message}")]
    Api { status: u16, message: String },
    /// Guarded update matched no row: another run claimed the item first
    #[error("Audit item {0} was already processed")]
    AlreadyProcessed(Uuid),
    #[error("Audit item {0} not found")]
    NotFound(Uuid),
    #[error("{0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        let message = err.to_string();
        match err {
            StoreError::Database(_) => AppError::database(message),
            StoreError::Http(e) if e.is_timeout() => AppError::timeout(message),
            StoreError::Http(_) => AppError::network(message),
            StoreError::Api { status, .. } => AppError::internal(message).with_detail("status", status),
            StoreError::AlreadyProcessed(_) | StoreError::NotFound(_) | StoreError::Backend(_) => {
                AppError::internal(message)
            }
        }
    }
}

/// Invocation-level failure: nothing in the queue was touched
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Fetch(StoreError),
}

impl ProcessError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ProcessError::Config(_) => ErrorCode::ConfigError,
            ProcessError::Fetch(_) => ErrorCode::AuditQueueFetchFailed,
        }
    }
}

impl From<ProcessError> for AppError {
    fn from(err: ProcessError) -> Self {
        match err {
            ProcessError::Config(e) => AppError::config(e.to_string()),
            ProcessError::Fetch(e) => {
                AppError::with_message(ErrorCode::AuditQueueFetchFailed, e.to_string())
            }
        }
    }
}

/// `{ error, details }` body of a failed invocation
#[derive(Debug, Serialize)]
pub struct FatalResponse {
    pub error: String,
    pub details: String,
}

pub const FATAL_ERROR_MESSAGE: &str = "Internal server error during audit processing";

impl IntoResponse for ProcessError {
    fn into_response(self) -> Response {
        tracing::error!(code = %self.code(), error = %self, "Fatal error in audit processing");
        let body = FatalResponse {
            error: FATAL_ERROR_MESSAGE.to_string(),
            details: self.to_string(),
        };
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_to_app_error() {
        let err: AppError = StoreError::Api {
            status: 503,
            message: "upstream unavailable".into(),
        }
        .into();
        assert_eq!(err.code, ErrorCode::InternalError);
        assert_eq!(err.message, "Backend returned 503: upstream unavailable");
        assert_eq!(err.details.unwrap()["status"], 503);

        let err: AppError = StoreError::Backend("pool closed".into()).into();
        assert_eq!(err.code, ErrorCode::InternalError);
        assert!(err.details.is_none());
    }

    #[test]
    fn test_process_error_codes() {
        let err = ProcessError::Config(ConfigError::Missing("SUPABASE_URL"));
        assert_eq!(err.code(), ErrorCode::ConfigError);
        assert_eq!(err.to_string(), "SUPABASE_URL must be set");

        let err = ProcessError::Fetch(StoreError::Backend("connection refused".into()));
        assert_eq!(err.code(), ErrorCode::AuditQueueFetchFailed);
        assert_eq!(err.to_string(), "connection refused");
    }

    #[test]
    fn test_process_error_response_is_500() {
        let response = ProcessError::Fetch(StoreError::Backend("down".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
