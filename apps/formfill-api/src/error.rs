//! Error types for the formfill API

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use formfill_core::FormFillError;
use formfill_mail::MailError;
use serde_json::json;
use thiserror::Error;

use crate::template::TemplateError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("Failed to fill form: {0}")]
    Fill(#[from] FormFillError),

    #[error("Failed to send email: {0}")]
    Mail(#[from] MailError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(e: tokio::task::JoinError) -> Self {
        ApiError::Internal(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Template(e) => {
                tracing::error!(error = %e, "Template unavailable");
                (StatusCode::BAD_GATEWAY, e.to_string())
            }
            ApiError::Mail(e) => {
                tracing::error!(error = %e, "Mail delivery failed");
                (StatusCode::BAD_GATEWAY, self.to_string())
            }
            ApiError::Fill(e) => {
                tracing::error!("Fill error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to fill form".to_string(),
                )
            }
            ApiError::Io(e) => {
                tracing::error!("I/O error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to write filled form".to_string(),
                )
            }
            ApiError::Internal(e) => {
                tracing::error!("Internal error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal error".to_string(),
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
