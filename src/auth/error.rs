use axum::response::{IntoResponse, Response};

use crate::routes::ApiError;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No valid admin or clinic cookie.
    #[error("Authentication required")]
    Unauthenticated,

    /// Login attempt with an unknown email or wrong password. Deliberately vague.
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("{0}")]
    Forbidden(String),

    #[error("Admin login is not configured")]
    AdminNotConfigured,

    #[error("Internal authentication error: {0}")]
    Internal(String),
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Unauthenticated => ApiError::Unauthorized(err.to_string()),
            AuthError::InvalidCredentials => ApiError::Unauthorized(err.to_string()),
            AuthError::Forbidden(msg) => ApiError::Forbidden(msg),
            AuthError::AdminNotConfigured => ApiError::NotConfigured(err.to_string()),
            AuthError::Internal(msg) => ApiError::Internal(msg),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}
