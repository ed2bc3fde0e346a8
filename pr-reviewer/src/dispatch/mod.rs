//! Comment dispatcher: turn a [`ReviewResult`] into PR comments.
//!
//! Delivery order: summary comment first, then file comments, then
//! documentation notes (payload order), then one aggregated fallback
//! comment for everything inline placement rejected. No generated item is
//! ever silently lost; inline precision may degrade to a flat list.
//! Side effects are strictly additive: comments are only created.

pub mod lang;

use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, error, info, warn};

use crate::analyze::{LineRef, ReviewResult};
use crate::bitbucket::BitbucketClient;
use crate::errors::{Error, PrResult};
use crate::webhook::PrDescriptor;

const FALLBACK_HEADING: &str = "## Inline Comments (Could not post directly)";

/// Per-request delivery tally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliverySummary {
    /// Items placed inline.
    pub delivered: usize,
    /// Items carried by the aggregated fallback comment.
    pub fell_back: usize,
    pub overall_posted: bool,
}

/// One feedback item whose inline placement was rejected. `line` keeps the
/// raw value from the review so malformed references stay readable.
#[derive(Debug, Clone)]
struct FallbackItem {
    file: String,
    line: String,
    text: String,
}

/// Deliver every piece of feedback in `review` onto the PR.
///
/// A failure local to one item never aborts the remaining items; failures
/// of the summary or fallback posts are logged and reflected in the tally.
pub async fn deliver(
    client: &BitbucketClient,
    pr: &PrDescriptor,
    review: &ReviewResult,
) -> DeliverySummary {
    let mut summary = DeliverySummary::default();
    let mut fallback: Vec<FallbackItem> = Vec::new();

    if let Some(overall) = review.overall_comment.as_deref() {
        match client.post_comment(pr, overall).await {
            Ok(()) => summary.overall_posted = true,
            Err(e) => error!(error = %e, "failed to post overall comment"),
        }
    }

    for c in &review.file_comments {
        let mut text = format!("[{}] {}", c.category.label(), c.comment);
        text = annotate_fences(&text, &c.file);

        debug!(file = %c.file, line = %c.line_number, "posting inline comment");
        match place_inline(client, pr, &c.file, &c.line_number, &text).await {
            Ok(()) => summary.delivered += 1,
            Err(e) => {
                warn!(error = %e, file = %c.file, "inline comment failed, queuing for fallback");
                fallback.push(FallbackItem {
                    file: c.file.clone(),
                    line: c.line_number.to_string(),
                    text,
                });
            }
        }
    }

    for d in &review.documentation {
        let text = format!(
            "**Suggested Documentation:**\n```{}\n{}\n```",
            lang::doc_language_for_path(&d.file),
            d.doc_comment
        );

        debug!(file = %d.file, line = %d.line_number, "posting documentation suggestion");
        match place_inline(client, pr, &d.file, &d.line_number, &text).await {
            Ok(()) => summary.delivered += 1,
            Err(e) => {
                warn!(error = %e, file = %d.file, "doc suggestion failed, queuing for fallback");
                fallback.push(FallbackItem {
                    file: d.file.clone(),
                    line: d.line_number.to_string(),
                    text,
                });
            }
        }
    }

    if !fallback.is_empty() {
        info!(items = fallback.len(), "posting fallback comment");
        summary.fell_back = fallback.len();
        let text = render_fallback(&fallback);
        if let Err(e) = client.post_comment(pr, &text).await {
            // Nothing further to degrade to; the items are in the logs.
            error!(error = %e, "failed to post fallback comment");
        }
    }

    summary
}

/// Coerce the line reference and post one inline comment.
///
/// A non-numeric line is an immediate validation failure without a network
/// call; the caller routes it to the fallback like any other rejection.
async fn place_inline(
    client: &BitbucketClient,
    pr: &PrDescriptor,
    file: &str,
    line: &LineRef,
    text: &str,
) -> PrResult<()> {
    let Some(line) = line.coerce() else {
        return Err(Error::Validation(format!("invalid line number: {line}")));
    };
    client.post_inline_comment(pr, file, line, text).await
}

/// Tag untagged code fences with a language inferred from the file extension.
fn annotate_fences(text: &str, file_path: &str) -> String {
    static TAGGED: OnceLock<Regex> = OnceLock::new();
    let tagged = TAGGED.get_or_init(|| Regex::new(r"```\w+").expect("valid fence regex"));

    if !text.contains("```") || tagged.is_match(text) {
        return text.to_string();
    }
    match lang::language_for_path(file_path) {
        Some(lang) => text.replace("```\n", &format!("```{lang}\n")),
        None => text.to_string(),
    }
}

fn render_fallback(items: &[FallbackItem]) -> String {
    let mut out = format!("{FALLBACK_HEADING}\n\n");
    for item in items {
        out.push_str(&format!(
            "**{} (line {}):**\n{}\n\n---\n\n",
            item.file, item.line, item.text
        ));
    }
    out
}
