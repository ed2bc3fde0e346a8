//! Thin OpenAI chat-completions client for the analyzer.
//!
//! Direct HTTP call (`POST {endpoint}/v1/chat/completions`, non-streaming)
//! instead of a client library. Every failure mode resolves to a distinct
//! human-readable string prefixed with [`parse::ERROR_MARKER`], which the
//! parse ladder turns into a degraded review result; callers never see an
//! `Err` from [`OpenAiClient::chat`].

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use super::parse::ERROR_MARKER;

const CHAT_TIMEOUT: Duration = Duration::from_secs(120);
const TEMPERATURE: f32 = 0.2;

/// Analyzer backend configuration.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// API base, e.g. "https://api.openai.com".
    pub endpoint: String,
    /// `None` disables the analyzer with a logged config error.
    pub api_key: Option<String>,
    pub model: String,
}

impl LlmConfig {
    pub fn from_env() -> Self {
        Self {
            endpoint: std::env::var("OPENAI_API_BASE")
                .unwrap_or_else(|_| "https://api.openai.com".into()),
            api_key: std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty()),
            model: std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-3.5-turbo".into()),
        }
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatContent,
}

#[derive(Deserialize)]
struct ChatContent {
    content: String,
}

/// Non-streaming chat client with a fixed 120s timeout.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    cfg: LlmConfig,
    url_chat: String,
}

impl OpenAiClient {
    pub fn new(cfg: LlmConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(CHAT_TIMEOUT)
            .build()
            .expect("http client");
        let url_chat = format!("{}/v1/chat/completions", cfg.endpoint.trim_end_matches('/'));
        Self { http, cfg, url_chat }
    }

    /// One chat completion. Always returns text: either the model content or
    /// an `Error: ...` string describing what went wrong.
    pub async fn chat(&self, system: &str, user: &str) -> String {
        let Some(api_key) = self.cfg.api_key.as_deref().filter(|k| !k.is_empty()) else {
            error!("OpenAI API key not configured");
            return format!(
                "{ERROR_MARKER} OpenAI API key not configured. Please set the \
                 OPENAI_API_KEY environment variable."
            );
        };

        let request = ChatRequest {
            model: &self.cfg.model,
            messages: [
                ChatMessage { role: "system", content: system },
                ChatMessage { role: "user", content: user },
            ],
            temperature: TEMPERATURE,
        };

        debug!(url = %self.url_chat, model = %self.cfg.model, "sending chat completion request");
        let response = match self
            .http
            .post(&self.url_chat)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) if e.is_timeout() => {
                error!(error = %e, "timeout calling the AI service");
                return format!(
                    "{ERROR_MARKER} The AI service request timed out. Please try again later."
                );
            }
            Err(e) => {
                error!(error = %e, "connection error to the AI service");
                return format!(
                    "{ERROR_MARKER} Could not connect to the AI service. Please check \
                     your internet connection and try again."
                );
            }
        };

        let status = response.status();
        info!(status = status.as_u16(), "AI service response status");
        if !status.is_success() {
            error!(status = status.as_u16(), "AI service returned an error");
            return format!(
                "{ERROR_MARKER} The AI service returned an error (HTTP {}). Please \
                 check the logs for details.",
                status.as_u16()
            );
        }

        let envelope: ChatResponse = match response.json().await {
            Ok(v) => v,
            Err(e) => {
                error!(error = %e, "could not decode the AI service response");
                return format!(
                    "{ERROR_MARKER} Could not parse the AI service response. Please \
                     check the logs."
                );
            }
        };

        match envelope.choices.into_iter().next() {
            Some(choice) => {
                info!(chars = choice.message.content.len(), "extracted model content");
                choice.message.content
            }
            None => {
                error!("AI response envelope carried no choices");
                format!("{ERROR_MARKER} Unexpected response format from AI service.")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(endpoint: String, api_key: Option<&str>) -> LlmConfig {
        LlmConfig {
            endpoint,
            api_key: api_key.map(str::to_string),
            model: "gpt-3.5-turbo".into(),
        }
    }

    #[tokio::test]
    async fn missing_key_yields_error_marker_without_a_call() {
        let client = OpenAiClient::new(cfg("http://127.0.0.1:1".into(), None));
        let out = client.chat("s", "u").await;
        assert!(out.starts_with(ERROR_MARKER));
        assert!(out.contains("OPENAI_API_KEY"));
    }

    #[tokio::test]
    async fn returns_model_content_on_success() {
        let mut server = mockito::Server::new_async().await;
        let m = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer key")
            .with_status(200)
            .with_body(r#"{"choices":[{"message":{"content":"looks good"}}]}"#)
            .create_async()
            .await;

        let client = OpenAiClient::new(cfg(server.url(), Some("key")));
        assert_eq!(client.chat("s", "u").await, "looks good");
        m.assert_async().await;
    }

    #[tokio::test]
    async fn non_200_status_yields_distinct_message() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(429)
            .create_async()
            .await;

        let client = OpenAiClient::new(cfg(server.url(), Some("key")));
        let out = client.chat("s", "u").await;
        assert!(out.starts_with(ERROR_MARKER));
        assert!(out.contains("HTTP 429"));
    }

    #[tokio::test]
    async fn malformed_envelope_yields_parse_error_message() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_body("not json at all")
            .create_async()
            .await;

        let client = OpenAiClient::new(cfg(server.url(), Some("key")));
        let out = client.chat("s", "u").await;
        assert!(out.starts_with(ERROR_MARKER));
        assert!(out.contains("parse"));
    }

    #[tokio::test]
    async fn empty_choices_yields_format_error_message() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_body(r#"{"choices":[]}"#)
            .create_async()
            .await;

        let client = OpenAiClient::new(cfg(server.url(), Some("key")));
        let out = client.chat("s", "u").await;
        assert!(out.starts_with(ERROR_MARKER));
        assert!(out.contains("Unexpected response format"));
    }

    #[tokio::test]
    async fn connection_failure_yields_connect_message() {
        let client = OpenAiClient::new(cfg("http://127.0.0.1:1".into(), Some("key")));
        let out = client.chat("s", "u").await;
        assert!(out.starts_with(ERROR_MARKER));
        assert!(out.contains("connect"));
    }
}
