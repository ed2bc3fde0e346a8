use pr_reviewer::webhook::PrDescriptor;
use serde::Serialize;

/// 200-response body for handled webhook calls.
#[derive(Serialize)]
pub struct WebhookResponse {
    pub status: &'static str,
    pub message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pr_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
}

impl WebhookResponse {
    pub fn ignored() -> Self {
        Self {
            status: "ignored",
            message: "Not a PR event",
            pr_id: None,
            repo: None,
        }
    }

    pub fn success(pr: &PrDescriptor) -> Self {
        Self {
            status: "success",
            message: "PR analyzed and comments posted",
            pr_id: pr.id,
            repo: pr.repo_full_name.clone(),
        }
    }
}
