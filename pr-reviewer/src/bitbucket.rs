//! Bitbucket Cloud client for the review pipeline.
//!
//! Endpoints used:
//! - GET  /2.0/repositories/{workspace}/{repo_slug}/pullrequests/{id}/diff
//! - GET  /2.0/.../pullrequests/{id}/commits
//! - POST /2.0/.../pullrequests/{id}/comments   (summary and inline)
//!
//! All calls carry `Authorization: Bearer <token>`; a missing token is a
//! typed config failure, never a panic. No call is retried.

use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::errors::{ConfigError, Error, PrResult};
use crate::webhook::PrDescriptor;

/// Bitbucket Cloud REST API base.
pub const DEFAULT_API_BASE: &str = "https://api.bitbucket.org/2.0";

/// Ceiling on the diff text handed downstream; larger diffs are truncated
/// with a visible marker. Keeps LLM requests within token budgets.
pub const MAX_DIFF_CHARS: usize = 20_000;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct BitbucketClient {
    http: Client,
    base_api: String,
    token: Option<String>,
}

impl BitbucketClient {
    /// Constructs a client with a fixed 30s per-call timeout.
    ///
    /// `token: None` is a valid state: every network call then resolves to
    /// [`ConfigError::MissingToken`] so the feature degrades instead of
    /// crashing at startup.
    pub fn new(base_api: impl Into<String>, token: Option<String>) -> Self {
        let http = Client::builder()
            .user_agent("pr-ai-reviewer/0.1")
            .timeout(HTTP_TIMEOUT)
            .build()
            .expect("http client");
        Self {
            http,
            base_api: base_api.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    fn bearer(&self) -> PrResult<&str> {
        self.token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ConfigError::MissingToken.into())
    }

    /// `.../repositories/{full_name}/pullrequests/{id}` prefix, requiring
    /// both identifying fields of the descriptor.
    fn pr_url(&self, pr: &PrDescriptor) -> PrResult<String> {
        let (Some(id), Some(repo)) = (pr.id, pr.repo_full_name.as_deref()) else {
            return Err(Error::Validation(
                "pull request id and repository full name are required".into(),
            ));
        };
        Ok(format!(
            "{}/repositories/{}/pullrequests/{}",
            self.base_api, repo, id
        ))
    }

    /// Fetch the unified diff for a PR, truncated to [`MAX_DIFF_CHARS`].
    ///
    /// Prefers the diff URL supplied by the webhook payload; otherwise the
    /// endpoint is constructed from the repository full name and PR id.
    pub async fn get_pr_diff(&self, pr: &PrDescriptor) -> PrResult<String> {
        let token = self.bearer()?;

        let diff_url = match pr.diff_links.get("diff") {
            Some(href) => {
                debug!(url = %href, "using diff URL from PR links");
                href.clone()
            }
            None => {
                let url = format!("{}/diff", self.pr_url(pr)?);
                debug!(url = %url, "constructed diff URL");
                url
            }
        };

        let diff = self
            .http
            .get(&diff_url)
            .bearer_auth(token)
            .header(reqwest::header::ACCEPT, "text/plain")
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let total = diff.chars().count();
        info!(chars = total, "retrieved PR diff");

        if total > MAX_DIFF_CHARS {
            warn!(
                chars = total,
                ceiling = MAX_DIFF_CHARS,
                "diff is very large, truncating"
            );
            let mut truncated: String = diff.chars().take(MAX_DIFF_CHARS).collect();
            truncated.push_str(&format!(
                "\n... [Diff truncated, total size: {total} chars]"
            ));
            return Ok(truncated);
        }
        Ok(diff)
    }

    /// Post a top-level PR comment under the review heading.
    pub async fn post_comment(&self, pr: &PrDescriptor, comment: &str) -> PrResult<()> {
        let token = self.bearer()?;
        let url = format!("{}/comments", self.pr_url(pr)?);

        let body = json!({
            "content": { "raw": format!("## AI Code Review\n\n{comment}") }
        });

        self.http
            .post(&url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        info!(pr = ?pr.id, "posted summary comment");
        Ok(())
    }

    /// Post an inline comment anchored to `file_path:line`.
    ///
    /// Validates before touching the network: the line must be positive and
    /// the normalized path non-empty. Any non-2xx response or transport error
    /// surfaces as `Err`; the dispatcher decides the fallback policy.
    pub async fn post_inline_comment(
        &self,
        pr: &PrDescriptor,
        file_path: &str,
        line: i64,
        comment: &str,
    ) -> PrResult<()> {
        if line < 1 {
            return Err(Error::Validation(format!(
                "invalid line number: {line} - must be a positive integer"
            )));
        }

        let normalized = normalize_path(file_path);
        debug!(from = %file_path, to = %normalized, "normalized inline comment path");
        if normalized.is_empty() {
            return Err(Error::Validation(format!("invalid file path: {file_path:?}")));
        }

        let token = self.bearer()?;
        let url = format!("{}/comments", self.pr_url(pr)?);

        let body = json!({
            "content": { "raw": comment },
            "inline": { "path": normalized, "to": line }
        });

        self.http
            .post(&url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        info!(pr = ?pr.id, path = %normalized, line, "posted inline comment");
        Ok(())
    }

    /// Latest commit hash of the PR, if any.
    pub async fn get_latest_commit_id(&self, pr: &PrDescriptor) -> PrResult<Option<String>> {
        let token = self.bearer()?;
        let url = format!("{}/commits", self.pr_url(pr)?);

        let payload: serde_json::Value = self
            .http
            .get(&url)
            .bearer_auth(token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let commit = payload["values"][0]["hash"].as_str().map(str::to_string);
        if commit.is_none() {
            warn!(pr = ?pr.id, "no commits found in the PR");
        }
        Ok(commit)
    }
}

/// Normalize a repo-relative path for the Bitbucket API.
///
/// Backslashes become forward slashes and leading slashes are stripped.
/// Paths escaping the repo root (`..`) are flagged but not rejected here;
/// the API turns them down on its own.
pub fn normalize_path(file_path: &str) -> String {
    let normalized = file_path.replace('\\', "/");
    let normalized = normalized.trim_start_matches('/').to_string();
    if normalized.is_empty() || normalized.starts_with("..") {
        warn!(path = %file_path, normalized = %normalized, "suspicious path format");
    }
    normalized
}

/// Target (`b/`) file names from `diff --git` headers.
pub fn extract_files_from_diff(diff: &str) -> Vec<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"(?m)^diff --git a/(.*?) b/(.*?)$").expect("valid diff header regex")
    });
    re.captures_iter(diff)
        .filter_map(|c| c.get(2).map(|m| m.as_str().to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn descriptor() -> PrDescriptor {
        PrDescriptor {
            id: Some(123),
            title: "t".into(),
            repo_full_name: Some("acme/widgets".into()),
            ..Default::default()
        }
    }

    #[test]
    fn normalizes_paths() {
        assert_eq!(normalize_path("src\\x.py"), "src/x.py");
        assert_eq!(normalize_path("/src/x.py"), "src/x.py");
        assert_eq!(normalize_path("src/x.py"), "src/x.py");
        // Flagged but passed through.
        assert_eq!(normalize_path("../evil.py"), "../evil.py");
        assert_eq!(normalize_path(""), "");
    }

    #[test]
    fn extracts_target_files_from_diff() {
        let diff = "diff --git a/src/a.py b/src/a.py\n+x\ndiff --git a/old.js b/new.js\n-y\n";
        assert_eq!(extract_files_from_diff(diff), vec!["src/a.py", "new.js"]);
        assert!(extract_files_from_diff("").is_empty());
    }

    #[tokio::test]
    async fn diff_fetch_requires_token() {
        let client = BitbucketClient::new(DEFAULT_API_BASE, None);
        let err = client.get_pr_diff(&descriptor()).await.unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::MissingToken)));
    }

    #[tokio::test]
    async fn diff_fetch_requires_pr_identity() {
        let client = BitbucketClient::new(DEFAULT_API_BASE, Some("tok".into()));
        let err = client
            .get_pr_diff(&PrDescriptor::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn fetches_and_truncates_large_diff() {
        let mut server = mockito::Server::new_async().await;
        let big = "a".repeat(MAX_DIFF_CHARS + 5_000);
        let m = server
            .mock("GET", "/repositories/acme/widgets/pullrequests/123/diff")
            .match_header("accept", "text/plain")
            .match_header("authorization", "Bearer tok")
            .with_status(200)
            .with_body(&big)
            .create_async()
            .await;

        let client = BitbucketClient::new(server.url(), Some("tok".into()));
        let diff = client.get_pr_diff(&descriptor()).await.unwrap();

        let marker = format!("\n... [Diff truncated, total size: {} chars]", big.len());
        assert!(diff.ends_with(&marker));
        assert_eq!(diff.chars().count(), MAX_DIFF_CHARS + marker.chars().count());
        m.assert_async().await;
    }

    #[tokio::test]
    async fn small_diff_passes_through_untouched() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/repositories/acme/widgets/pullrequests/123/diff")
            .with_status(200)
            .with_body("diff --git a/x b/x\n+1\n")
            .create_async()
            .await;

        let client = BitbucketClient::new(server.url(), Some("tok".into()));
        let diff = client.get_pr_diff(&descriptor()).await.unwrap();
        assert_eq!(diff, "diff --git a/x b/x\n+1\n");
    }

    #[tokio::test]
    async fn prefers_diff_link_from_payload() {
        let mut server = mockito::Server::new_async().await;
        let linked = server
            .mock("GET", "/linked/diff")
            .with_status(200)
            .with_body("+linked\n")
            .create_async()
            .await;

        let mut pr = descriptor();
        pr.diff_links = HashMap::from([("diff".to_string(), format!("{}/linked/diff", server.url()))]);

        let client = BitbucketClient::new(server.url(), Some("tok".into()));
        assert_eq!(client.get_pr_diff(&pr).await.unwrap(), "+linked\n");
        linked.assert_async().await;
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/repositories/acme/widgets/pullrequests/123/diff")
            .with_status(404)
            .create_async()
            .await;

        let client = BitbucketClient::new(server.url(), Some("tok".into()));
        assert!(client.get_pr_diff(&descriptor()).await.is_err());
    }

    #[tokio::test]
    async fn posts_inline_comment_with_normalized_path() {
        let mut server = mockito::Server::new_async().await;
        let m = server
            .mock("POST", "/repositories/acme/widgets/pullrequests/123/comments")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "inline": { "path": "src/x.py", "to": 10 }
            })))
            .with_status(201)
            .create_async()
            .await;

        let client = BitbucketClient::new(server.url(), Some("tok".into()));
        client
            .post_inline_comment(&descriptor(), "/src\\x.py", 10, "[BUG] text")
            .await
            .unwrap();
        m.assert_async().await;
    }

    #[tokio::test]
    async fn invalid_line_is_rejected_without_a_network_call() {
        // Unroutable base: a network attempt would fail differently.
        let client = BitbucketClient::new("http://127.0.0.1:1", Some("tok".into()));
        let err = client
            .post_inline_comment(&descriptor(), "src/x.py", 0, "text")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn reads_latest_commit_id() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/repositories/acme/widgets/pullrequests/123/commits")
            .with_status(200)
            .with_body(r#"{"values":[{"hash":"abc123"},{"hash":"def456"}]}"#)
            .create_async()
            .await;

        let client = BitbucketClient::new(server.url(), Some("tok".into()));
        assert_eq!(
            client.get_latest_commit_id(&descriptor()).await.unwrap(),
            Some("abc123".to_string())
        );
    }
}
