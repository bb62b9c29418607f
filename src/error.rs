use axum::{Json, http::StatusCode, response::{IntoResponse, Response}};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::models::ConflictKind;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Not found")]
    NotFound,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Malformed time: {0:?}")]
    MalformedTime(String),

    #[error("No room available for the requested window")]
    NoRoomAvailable,

    #[error("{0}")]
    Scheduling(ConflictKind),

    #[error("Quota exceeded for subject {subject_id}")]
    QuotaExceeded { subject_id: i64 },

    #[error("No teacher attached to subject {subject_id}")]
    NoTeacherAttached { subject_id: i64 },

    #[error("No active academic year")]
    NoActiveYear,

    #[error("Internal server error")]
    InternalServerError,
}

impl AppError {
    /// SQLite busy/locked and pool exhaustion clear up on their own; the
    /// caller may replay the whole transaction.
    pub fn is_transient(&self) -> bool {
        match self {
            AppError::Database(sqlx::Error::PoolTimedOut) => true,
            AppError::Database(sqlx::Error::Database(e)) => {
                matches!(e.code().as_deref(), Some("5") | Some("6") | Some("517"))
            }
            _ => false,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::NotFound => (StatusCode::NOT_FOUND, "Not Found".to_string()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::MalformedTime(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::NoRoomAvailable
            | AppError::Scheduling(_)
            | AppError::QuotaExceeded { .. } => (StatusCode::CONFLICT, self.to_string()),
            AppError::NoTeacherAttached { .. } | AppError::NoActiveYear => {
                (StatusCode::UNPROCESSABLE_ENTITY, self.to_string())
            }
            AppError::Database(e) => {
                error!("database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error occurred".to_string(),
                )
            }
            AppError::Migration(e) => {
                error!("migration error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error occurred".to_string(),
                )
            }
            AppError::InternalServerError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        let body = Json(ErrorResponse {
            error: status.to_string(),
            message: error_message,
        });

        (status, body).into_response()
    }
}
