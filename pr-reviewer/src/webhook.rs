//! Webhook event classification and PR descriptor extraction.
//!
//! The payload shape is Bitbucket Cloud's `pullrequest:*` event. Every field
//! is pulled defensively: partial payloads still yield a descriptor, and the
//! downstream client treats missing `id`/`repo_full_name` as a typed
//! validation failure rather than panicking here.

use std::collections::HashMap;

use serde_json::Value;
use tracing::debug;

/// Event-key header values that denote a reviewable PR event.
pub const PR_EVENT_KEYS: [&str; 2] = ["pullrequest:created", "pullrequest:updated"];

/// Name of the header carrying the event kind.
pub const EVENT_KEY_HEADER: &str = "X-Event-Key";

/// Normalized descriptor of the pull request under review.
///
/// Immutable once extracted; consumed by every downstream component.
#[derive(Debug, Clone, Default)]
pub struct PrDescriptor {
    pub id: Option<u64>,
    pub title: String,
    pub source_branch: Option<String>,
    pub destination_branch: Option<String>,
    /// `workspace/repo_slug` of the destination repository.
    pub repo_full_name: Option<String>,
    /// Link name → href, flattened from `pullrequest.links`.
    pub diff_links: HashMap<String, String>,
}

/// Decide whether an inbound payload is a PR creation/update event.
///
/// Primary signal is the event-key header; fallback is a top-level
/// `pullrequest` key in the body. A `null` or non-object payload is `false`.
pub fn is_pull_request_event(payload: &Value, event_key: Option<&str>) -> bool {
    if let Some(key) = event_key {
        debug!(event_key = %key, "event key header present");
        if PR_EVENT_KEYS.contains(&key) {
            return true;
        }
    }
    payload
        .as_object()
        .is_some_and(|o| o.contains_key("pullrequest"))
}

/// Extract a [`PrDescriptor`] from the raw payload.
///
/// Every field defaults independently: a partial payload never fails the
/// whole extraction.
pub fn extract_pr_descriptor(payload: &Value) -> PrDescriptor {
    let pr = &payload["pullrequest"];

    let mut diff_links = HashMap::new();
    if let Some(links) = pr["links"].as_object() {
        for (name, link) in links {
            if let Some(href) = link["href"].as_str() {
                diff_links.insert(name.clone(), href.to_string());
            }
        }
    }

    PrDescriptor {
        id: pr["id"].as_u64(),
        title: pr["title"].as_str().unwrap_or_default().to_string(),
        source_branch: json_str(pr, "/source/branch/name"),
        destination_branch: json_str(pr, "/destination/branch/name"),
        repo_full_name: json_str(pr, "/destination/repository/full_name"),
        diff_links,
    }
}

fn json_str(v: &Value, pointer: &str) -> Option<String> {
    v.pointer(pointer)
        .and_then(Value::as_str)
        .map(str::to_string)
}
