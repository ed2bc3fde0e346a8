//! Defensive parsing of the analyzer backend's response.
//!
//! Ordered chain of fallible parsers, tried until one succeeds:
//! 1. backend error marker → result carrying the error text;
//! 2. fenced ```json block (or any fenced block) → parse inner JSON;
//! 3. raw text as JSON;
//! 4. degrade to an "unexpected format" result with a short excerpt.

use tracing::{info, warn};

use super::ReviewResult;

/// Prefix marking a backend-call failure string (see [`super::llm`]).
pub const ERROR_MARKER: &str = "Error:";

/// Cap on the degraded-result excerpt when the text has no paragraph break.
const EXCERPT_CHARS: usize = 200;

/// Recover a well-formed [`ReviewResult`] from whatever the backend sent.
pub fn parse_review_response(raw: &str) -> ReviewResult {
    if raw.trim_start().starts_with(ERROR_MARKER) {
        return ReviewResult::overall_only(raw.trim());
    }

    let candidate = extract_fenced_block(raw).unwrap_or(raw.trim());
    match serde_json::from_str::<ReviewResult>(candidate) {
        Ok(result) => {
            info!("parsed structured review response");
            result
        }
        Err(e) => {
            warn!(error = %e, "AI response was not in the expected JSON format");
            ReviewResult::overall_only(format!(
                "Analysis completed, but the result format was unexpected. Summary: {}",
                excerpt(raw)
            ))
        }
    }
}

/// Contents of the first ```json fence, or of the first fence of any kind.
fn extract_fenced_block(raw: &str) -> Option<&str> {
    if let Some(start) = raw.find("```json") {
        let body = &raw[start + "```json".len()..];
        let end = body.find("```")?;
        return Some(body[..end].trim());
    }
    let start = raw.find("```")?;
    let body = &raw[start + 3..];
    // Skip an optional language tag on the opening fence line.
    let body = match body.find('\n') {
        Some(nl) if !body[..nl].trim().is_empty() && !body[..nl].trim().starts_with('{') => {
            &body[nl + 1..]
        }
        _ => body,
    };
    let end = body.find("```")?;
    Some(body[..end].trim())
}

/// First paragraph of the raw text when one is delimited; otherwise the
/// leading [`EXCERPT_CHARS`] characters.
fn excerpt(raw: &str) -> &str {
    match raw.split_once("\n\n") {
        Some((para, _)) => para,
        None => match raw.char_indices().nth(EXCERPT_CHARS) {
            Some((idx, _)) => &raw[..idx],
            None => raw,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::Category;

    const WELL_FORMED: &str = r#"{
        "overall_comment": "Solid change.",
        "file_comments": [
            {"file": "src/x.py", "line_number": 10, "category": "bug", "comment": "Off by one."}
        ],
        "documentation": []
    }"#;

    #[test]
    fn parses_unwrapped_json() {
        let r = parse_review_response(WELL_FORMED);
        assert_eq!(r.overall_comment.as_deref(), Some("Solid change."));
        assert_eq!(r.file_comments.len(), 1);
        assert_eq!(r.file_comments[0].category, Category::Bug);
    }

    #[test]
    fn fenced_json_parses_identically_to_unwrapped() {
        let fenced = format!("Here is my review:\n```json\n{WELL_FORMED}\n```\nDone.");
        let a = parse_review_response(&fenced);
        let b = parse_review_response(WELL_FORMED);
        assert_eq!(a.overall_comment, b.overall_comment);
        assert_eq!(a.file_comments.len(), b.file_comments.len());
        assert_eq!(a.file_comments[0].file, b.file_comments[0].file);
    }

    #[test]
    fn untagged_fence_is_extracted() {
        let fenced = format!("```\n{WELL_FORMED}\n```");
        let r = parse_review_response(&fenced);
        assert_eq!(r.overall_comment.as_deref(), Some("Solid change."));
    }

    #[test]
    fn error_marker_becomes_overall_comment() {
        let r = parse_review_response("Error: The AI service request timed out.");
        assert_eq!(
            r.overall_comment.as_deref(),
            Some("Error: The AI service request timed out.")
        );
        assert!(r.file_comments.is_empty());
        assert!(r.documentation.is_empty());
    }

    #[test]
    fn plain_prose_degrades_without_panicking() {
        let r = parse_review_response("The code looks fine to me.\n\nNothing else to add.");
        let overall = r.overall_comment.unwrap();
        assert!(overall.contains("unexpected"));
        assert!(overall.contains("The code looks fine to me."));
        assert!(!overall.contains("Nothing else to add."));
        assert!(r.file_comments.is_empty());
        assert!(r.documentation.is_empty());
    }

    #[test]
    fn unbroken_prose_excerpt_is_capped() {
        let long = "x".repeat(1000);
        let r = parse_review_response(&long);
        let overall = r.overall_comment.unwrap();
        assert!(overall.len() < 300);
    }

    #[test]
    fn first_paragraph_is_kept_whole_when_delimited() {
        let long_para = "y".repeat(500);
        let text = format!("{long_para}\n\nsecond paragraph");
        let r = parse_review_response(&text);
        let overall = r.overall_comment.unwrap();
        assert!(overall.contains(&long_para));
        assert!(!overall.contains("second paragraph"));
    }
}
