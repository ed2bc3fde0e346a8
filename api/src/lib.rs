//! HTTP layer: router, middleware pipeline and webhook handler.
//!
//! Request pipeline for `/webhook`:
//! admission guard → signature verification → classification → processing.
//! The probes (`/`, `/test`) sit outside the guarded pipeline.

use std::{env, error::Error, net::SocketAddr, sync::Arc};

pub mod core;
pub mod error_handler;
mod middleware_layer;
mod routes;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use tokio::signal;

use crate::core::app_state::AppState;
use crate::middleware_layer::{admission::admission, signature::verify_signature};
use crate::routes::{
    status::status_route::{home, test_probe},
    webhook::webhook_route::webhook,
};

/// Build the full application router for the given state.
///
/// Split from [`start`] so tests can drive the router directly.
pub fn router(state: Arc<AppState>) -> Router {
    // Layer order is inside-out: the admission stage (added last) runs
    // first, then signature verification, then the handler.
    let guarded = Router::new()
        .route("/webhook", post(webhook))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            verify_signature,
        ))
        .route_layer(middleware::from_fn_with_state(state.clone(), admission));

    Router::new()
        .route("/", get(home))
        .route("/test", get(test_probe))
        .merge(guarded)
        .with_state(state)
}

pub async fn start() -> Result<(), Box<dyn Error>> {
    let host_url = env::var("API_ADDRESS").unwrap_or_else(|_| "0.0.0.0:5000".into());

    let state = Arc::new(AppState::from_env());
    let app = router(state);

    // Bind to address
    let listener = tokio::net::TcpListener::bind(&host_url).await?;
    tracing::info!(address = %host_url, "server listening");

    // Start server with graceful shutdown on Ctrl+C. ConnectInfo carries
    // the peer address the admission stage keys its counters on.
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

/// Returns a future that resolves when Ctrl+C is pressed
async fn shutdown_signal() {
    // Wait for the Ctrl+C signal
    signal::ctrl_c()
        .await
        .expect("Failed to listen for shutdown signal");
}
