//! Shared state for all HTTP handlers.

use pr_reviewer::admission::{AdmissionGuard, DEFAULT_RATE_LIMIT};
use pr_reviewer::analyze::llm::{LlmConfig, OpenAiClient};
use pr_reviewer::bitbucket::{BitbucketClient, DEFAULT_API_BASE};

/// Shared state for all HTTP handlers.
pub struct AppState {
    /// Shared secret for webhook signatures. Empty means verification is
    /// skipped (permissive mode, logged as a warning per request).
    pub webhook_secret: String,
    /// Per-client hourly admission guard for the webhook path.
    pub guard: AdmissionGuard,
    /// Bitbucket Cloud client (diff fetch + comment posts).
    pub bitbucket: BitbucketClient,
    /// Analyzer backend client.
    pub llm: OpenAiClient,
}

impl AppState {
    /// Load shared state from environment variables.
    ///
    /// Missing credentials are tolerated: the corresponding feature then
    /// fails softly at call time instead of crashing startup.
    pub fn from_env() -> Self {
        let rate_limit = std::env::var("API_RATE_LIMIT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_RATE_LIMIT);

        Self {
            webhook_secret: std::env::var("WEBHOOK_SECRET").unwrap_or_default(),
            guard: AdmissionGuard::new(rate_limit),
            bitbucket: BitbucketClient::new(
                std::env::var("BITBUCKET_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.into()),
                std::env::var("BITBUCKET_ACCESS_TOKEN")
                    .ok()
                    .filter(|t| !t.is_empty()),
            ),
            llm: OpenAiClient::new(LlmConfig::from_env()),
        }
    }
}
