//! Error types for ecole-srv
//!
//! Two body shapes are produced:
//! - field errors (`400`): `{"field": ["message", ...]}`, with uniqueness
//!   collisions reported under `non_field_errors`
//! - everything else: `{"error": {"code": "...", "message": "..."}}`

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use ecole_common::models::ValidationError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Field validation failed (400)
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// A uniqueness constraint rejected the write (400, `non_field_errors`)
    #[error("Collision: {0}")]
    Collision(String),

    /// Malformed request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Missing or wrong credentials (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated but not allowed (403)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// Database error other than a constraint violation
    #[error("Database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        if let Some(db_err) = err.as_database_error() {
            if db_err.is_unique_violation() {
                return ApiError::Collision(unique_message(db_err.message()));
            }
            if db_err.is_foreign_key_violation() {
                return ApiError::BadRequest("Referenced object does not exist.".to_string());
            }
            if db_err.is_check_violation() {
                return ApiError::BadRequest(format!("Value out of range: {}", db_err.message()));
            }
        }
        ApiError::Database(err)
    }
}

/// Turn `UNIQUE constraint failed: affectations.eleve_aff, affectations.annee_aff`
/// into a readable sentence naming the columns.
fn unique_message(raw: &str) -> String {
    let columns: Vec<&str> = raw
        .split_once(':')
        .map(|(_, cols)| cols)
        .unwrap_or("")
        .split(',')
        .filter_map(|c| c.trim().rsplit('.').next())
        .filter(|c| !c.is_empty())
        .collect();
    if columns.is_empty() {
        "The record already exists.".to_string()
    } else {
        format!("The fields {} must make a unique set.", columns.join(", "))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::Validation(err) => {
                return (StatusCode::BAD_REQUEST, Json(json!(err.errors()))).into_response();
            }
            ApiError::Collision(msg) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "non_field_errors": [msg] })),
                )
                    .into_response();
            }
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::Internal(msg) => {
                error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg)
            }
            ApiError::Database(ref err) => {
                error!("Database error: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    err.to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_message_lists_columns() {
        assert_eq!(
            unique_message("UNIQUE constraint failed: affectations.eleve_aff, affectations.annee_aff"),
            "The fields eleve_aff, annee_aff must make a unique set."
        );
        assert_eq!(unique_message("weird"), "The record already exists.");
    }
}
