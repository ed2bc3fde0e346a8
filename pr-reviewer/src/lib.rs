//! Webhook-to-review delivery pipeline for pull requests.
//!
//! Single high-level function to run the whole pipeline for one PR:
//!
//! 1) **Step 1 — Diff acquisition**
//!    - Prefer the diff URL carried by the webhook payload
//!    - Otherwise construct the endpoint from repo + PR id
//!    - Truncate oversized diffs with a visible marker
//!
//! 2) **Step 2 — Analysis**
//!    - Short-circuit empty and oversized diffs without a backend call
//!    - Otherwise prompt the LLM for the structured JSON review
//!    - Recover from malformed responses via the parse ladder
//!
//! 3) **Step 3 — Delivery**
//!    - Summary comment, then inline comments in payload order
//!    - Rejected inline items aggregate into one fallback comment
//!
//! Signature verification ([`signature`]) and per-client admission
//! ([`admission`]) live here too; the HTTP layer composes them as pipeline
//! stages in front of the handler. The pipeline uses `tracing` for debug
//! logging and avoids `async-trait` and heap trait objects.

pub mod admission;
pub mod analyze;
pub mod bitbucket;
pub mod dispatch;
pub mod errors;
pub mod signature;
pub mod webhook;

use tracing::{debug, info};

use crate::analyze::llm::OpenAiClient;
use crate::bitbucket::BitbucketClient;
use crate::dispatch::DeliverySummary;
use crate::errors::PrResult;
use crate::webhook::PrDescriptor;

/// Outcome of one full pipeline run.
#[derive(Debug, Clone)]
pub struct ReviewRun {
    /// Size of the (possibly truncated) diff handed to the analyzer.
    pub diff_chars: usize,
    /// Target files named by the diff headers.
    pub changed_files: Vec<String>,
    pub delivery: DeliverySummary,
}

/// Run steps 1–3 for a single PR: fetch diff, analyze, deliver comments.
///
/// The only `Err` path is diff acquisition (step 1); the caller maps it to
/// its "diff unavailable" response. Analysis and delivery degrade
/// internally and always complete.
pub async fn run_review(
    bitbucket: &BitbucketClient,
    llm: &OpenAiClient,
    pr: &PrDescriptor,
) -> PrResult<ReviewRun> {
    debug!(pr = ?pr.id, "step1: fetch PR diff");
    let diff = bitbucket.get_pr_diff(pr).await?;

    let changed_files = bitbucket::extract_files_from_diff(&diff);
    info!(
        files = changed_files.len(),
        sample = ?changed_files.iter().take(5).collect::<Vec<_>>(),
        "step1: diff fetched"
    );

    debug!("step2: analyze diff");
    let review = analyze::analyze_diff(llm, &diff).await;
    info!(
        file_comments = review.file_comments.len(),
        doc_notes = review.documentation.len(),
        "step2: analysis completed"
    );

    debug!("step3: deliver comments");
    let delivery = dispatch::deliver(bitbucket, pr, &review).await;
    info!(
        delivered = delivery.delivered,
        fell_back = delivery.fell_back,
        "step3: delivery completed"
    );

    Ok(ReviewRun {
        diff_chars: diff.chars().count(),
        changed_files,
        delivery,
    })
}
