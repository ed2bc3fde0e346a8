//! Public application error type mapped onto HTTP responses.
//!
//! Every externally observable failure is a structured
//! `{status: "error", message}` body with a specific status code; nothing
//! escapes the pipeline boundary as an unhandled fault.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Public application error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Webhook signature missing or mismatching (→ 401).
    #[error("{0}")]
    SignatureRejected(&'static str),

    /// Client is over its hourly ceiling (→ 429).
    #[error("Rate limit exceeded. Maximum {limit} requests per hour.")]
    RateLimited { limit: u32 },

    /// Diff acquisition failed (→ 500).
    #[error("Failed to retrieve PR diff")]
    DiffUnavailable,
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::SignatureRejected(_) => StatusCode::UNAUTHORIZED,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::DiffUnavailable => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    status: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            status: "error",
            message: self.to_string(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}
