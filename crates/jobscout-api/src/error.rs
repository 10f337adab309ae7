//! API error handling.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// API error type.
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Unauthorized(String),
    Conflict(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

impl From<jobscout_db::DbError> for ApiError {
    fn from(err: jobscout_db::DbError) -> Self {
        match err {
            // Ownership misses and true misses are indistinguishable
            // on purpose: no existence disclosure across users.
            jobscout_db::DbError::NotFound(msg) => ApiError::NotFound(msg),
            jobscout_db::DbError::Duplicate(msg) => ApiError::Conflict(msg),
            _ => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<jobscout_core::Error> for ApiError {
    fn from(err: jobscout_core::Error) -> Self {
        match err {
            jobscout_core::Error::NotFound(msg) => ApiError::NotFound(msg),
            jobscout_core::Error::Conflict(msg) => ApiError::Conflict(msg),
            jobscout_core::Error::Format(msg) => ApiError::BadRequest(msg),
            _ => ApiError::Internal(err.to_string()),
        }
    }
}
