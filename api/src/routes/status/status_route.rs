//! Liveness and reachability probes. Neither is rate limited.

use axum::Json;
use chrono::Utc;
use serde::Serialize;
use tracing::info;

/// GET /
pub async fn home() -> &'static str {
    "AI Code Reviewer is running!"
}

#[derive(Serialize)]
pub struct TestResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub timestamp: String,
}

/// GET /test
///
/// Reachability probe used when wiring up the webhook on the hosting side.
pub async fn test_probe() -> Json<TestResponse> {
    info!("test endpoint accessed");
    Json(TestResponse {
        status: "success",
        message: "Server is accessible",
        timestamp: Utc::now().to_rfc3339(),
    })
}
