//! POST /webhook
//!
//! The admission and signature stages have already run by the time this
//! handler sees the request. Remaining pipeline: classify → extract →
//! fetch diff → analyze → deliver comments.

use std::sync::Arc;

use axum::{Json, extract::State, http::HeaderMap};
use pr_reviewer::webhook::{EVENT_KEY_HEADER, extract_pr_descriptor, is_pull_request_event};
use serde_json::Value;
use tracing::{error, info};

use crate::{
    core::app_state::AppState, error_handler::AppError,
    routes::webhook::webhook_response::WebhookResponse,
};

pub async fn webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> Result<Json<WebhookResponse>, AppError> {
    let event_key = headers
        .get(EVENT_KEY_HEADER)
        .and_then(|v| v.to_str().ok());

    if !is_pull_request_event(&payload, event_key) {
        info!("ignoring non-PR event");
        return Ok(Json(WebhookResponse::ignored()));
    }

    let pr = extract_pr_descriptor(&payload);
    info!(
        pr = ?pr.id,
        title = %pr.title,
        repo = ?pr.repo_full_name,
        "processing pull request"
    );

    let run = pr_reviewer::run_review(&state.bitbucket, &state.llm, &pr)
        .await
        .map_err(|e| {
            error!(error = %e, "failed to retrieve PR diff");
            AppError::DiffUnavailable
        })?;

    info!(
        delivered = run.delivery.delivered,
        fell_back = run.delivery.fell_back,
        "PR processing complete"
    );
    Ok(Json(WebhookResponse::success(&pr)))
}
