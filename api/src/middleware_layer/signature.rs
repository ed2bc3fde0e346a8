//! Signature stage: authenticate the raw webhook body before parsing.
//!
//! The body is buffered here so the HMAC runs over exactly the bytes the
//! sender signed, then handed back to the handler untouched.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use pr_reviewer::signature::{self, SIGNATURE_HEADERS, SignatureCheck};
use tracing::warn;

use crate::{core::app_state::AppState, error_handler::AppError};

pub async fn verify_signature(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    let (parts, body) = req.into_parts();

    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(b) => b,
        Err(_) => {
            return AppError::SignatureRejected("Signature validation error").into_response();
        }
    };

    let header = SIGNATURE_HEADERS
        .iter()
        .find_map(|name| parts.headers.get(*name))
        .and_then(|v| v.to_str().ok());

    match signature::verify(&state.webhook_secret, &bytes, header) {
        SignatureCheck::Skipped => {
            warn!("webhook secret not configured - skipping signature verification");
        }
        SignatureCheck::Accepted => {}
        SignatureCheck::Rejected(reason) => {
            warn!(reason, "rejected webhook signature");
            return AppError::SignatureRejected(reason).into_response();
        }
    }

    let req = Request::from_parts(parts, Body::from(bytes));
    next.run(req).await
}
