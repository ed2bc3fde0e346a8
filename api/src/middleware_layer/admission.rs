//! Admission stage: per-client hourly rate limiting for the webhook path.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use pr_reviewer::admission::Admission;
use tracing::debug;

use crate::{core::app_state::AppState, error_handler::AppError};

/// Count this call against the peer's hourly window; reject when over the
/// ceiling. Applies only to the routes it is layered onto.
pub async fn admission(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    req: Request,
    next: Next,
) -> Response {
    let client_key = addr.ip().to_string();
    match state.guard.admit(&client_key) {
        Admission::Allowed => {
            debug!(client = %client_key, "admission check passed");
            next.run(req).await
        }
        Admission::Limited { limit } => AppError::RateLimited { limit }.into_response(),
    }
}
