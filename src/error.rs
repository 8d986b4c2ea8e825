#![allow(dead_code)]
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Serialize, Serializer};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CluckError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Access denied: {0}")]
    Access(String),

    #[error("Upstream AI error: {0}")]
    Upstream(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Analysis error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    #[error("Bcrypt error: {0}")]
    Bcrypt(#[from] bcrypt::BcryptError),

    #[error("Token error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
}

// Errors cross the wire as plain strings inside the standard envelope.
impl Serialize for CluckError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.to_string().as_ref())
    }
}

pub type CluckResult<T> = Result<T, CluckError>;

impl IntoResponse for CluckError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            CluckError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            CluckError::Auth(msg) => (StatusCode::UNAUTHORIZED, msg),
            CluckError::Access(msg) => (StatusCode::FORBIDDEN, msg),
            CluckError::Upstream(msg) => {
                tracing::warn!("Upstream AI failure: {}", msg);
                (StatusCode::BAD_GATEWAY, msg)
            }
            CluckError::Network(ref e) => {
                tracing::warn!("Network failure: {:?}", e);
                (
                    StatusCode::BAD_GATEWAY,
                    "External service is unreachable.".to_string(),
                )
            }
            CluckError::Database(ref e) => {
                tracing::error!("Database Error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "A database error occurred.".to_string(),
                )
            }
            CluckError::Jwt(_) => (
                StatusCode::UNAUTHORIZED,
                "Invalid or expired token.".to_string(),
            ),
            _ => {
                tracing::error!("Unhandled Error: {:?}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An unexpected error occurred.".to_string(),
                )
            }
        };

        let body = Json(json!({
            "success": false,
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
