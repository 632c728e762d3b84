//! Error types for the onboarding API

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use onboard_pdf::OnboardPdfError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("PDF error: {0}")]
    Pdf(#[from] OnboardPdfError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Server-side detail only leaves the process in debug builds
fn server_message(generic: &str, detail: impl std::fmt::Display) -> String {
    if cfg!(debug_assertions) {
        format!("{}: {}", generic, detail)
    } else {
        generic.to_string()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Pdf(OnboardPdfError::NoDocuments) => {
                (StatusCode::NOT_FOUND, OnboardPdfError::NoDocuments.to_string())
            }
            ApiError::Pdf(e) => {
                tracing::error!("PDF error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    server_message("Failed to generate PDF", e),
                )
            }
            ApiError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    server_message("Database error", e),
                )
            }
            ApiError::Internal(e) => {
                tracing::error!("Internal error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    server_message("Internal error", e),
                )
            }
        };

        let body = Json(json!({
            "error": message,
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}
