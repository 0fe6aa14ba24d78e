use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::{
    db::DbError,
    services::{BlobStoreError, ClinicServiceError, VideoServiceError},
};

/// Error body: `{"error": {"type": ..., "message": ...}}`.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    #[serde(rename = "type")]
    pub error_type: &'static str,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error_type: &'static str, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                error_type,
                message: message.into(),
            },
        }
    }
}

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    Conflict(String),
    Validation(String),
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    NotConfigured(String),
    DatabaseRequired,
    Database(DbError),
    Internal(String),
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound => ApiError::NotFound("Resource not found".to_string()),
            DbError::Conflict(msg) => ApiError::Conflict(msg),
            DbError::Validation(msg) => ApiError::Validation(msg),
            DbError::NotConfigured => ApiError::DatabaseRequired,
            _ => ApiError::Database(err),
        }
    }
}

impl From<ClinicServiceError> for ApiError {
    fn from(err: ClinicServiceError) -> Self {
        match err {
            ClinicServiceError::Database(db_err) => db_err.into(),
            ClinicServiceError::Password(e) => {
                tracing::error!(error = %e, "Password hashing failed");
                ApiError::Internal("An internal error occurred".to_string())
            }
        }
    }
}

impl From<BlobStoreError> for ApiError {
    fn from(err: BlobStoreError) -> Self {
        match err {
            BlobStoreError::NotFound(key) => ApiError::NotFound(format!("File '{key}' not found")),
            BlobStoreError::AlreadyExists(key) => {
                ApiError::Conflict(format!("File '{key}' already exists"))
            }
            BlobStoreError::InvalidKey(key) => {
                ApiError::BadRequest(format!("Invalid file name '{key}'"))
            }
            other => {
                tracing::error!(error = %other, "Video storage error");
                ApiError::Internal("Video storage is unavailable".to_string())
            }
        }
    }
}

impl From<VideoServiceError> for ApiError {
    fn from(err: VideoServiceError) -> Self {
        match err {
            VideoServiceError::Database(db_err) => db_err.into(),
            VideoServiceError::Storage(storage_err) => storage_err.into(),
            VideoServiceError::NotFound(id) => ApiError::NotFound(format!("Video '{id}' not found")),
            VideoServiceError::EmptyFile => {
                ApiError::BadRequest("Uploaded file is empty".to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg),
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, "validation_error", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg),
            ApiError::NotConfigured(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "not_configured", msg)
            }
            ApiError::DatabaseRequired => (
                StatusCode::SERVICE_UNAVAILABLE,
                "not_configured",
                "This endpoint requires a configured [database] section".to_string(),
            ),
            ApiError::Database(err) => {
                tracing::error!(error = %err, "Database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "database_error",
                    "An internal database error occurred".to_string(),
                )
            }
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
        };

        (status, Json(ErrorResponse::new(error_type, message))).into_response()
    }
}
