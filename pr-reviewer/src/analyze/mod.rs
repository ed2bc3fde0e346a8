//! Review analyzer: diff in, structured [`ReviewResult`] out.
//!
//! The LLM is instructed to answer with a JSON object
//! (`overall_comment`, `file_comments[]`, `documentation[]`). Responses
//! that deviate from the contract are recovered by an ordered chain of
//! fallible parsers (see [`parse`]); a malformed backend response never
//! aborts the pipeline.

pub mod llm;
pub mod parse;

use std::fmt;

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::{info, warn};

use self::llm::OpenAiClient;

/// Diffs above this size get a fixed "too large" review without any
/// backend call. Deliberately distinct from the fetcher's truncation
/// ceiling: this is a second line of defense on the prompt size.
pub const MAX_ANALYZE_BYTES: usize = 50 * 1024;

const NO_CHANGES_MESSAGE: &str = "No changes found to analyze.";

const OVERSIZED_MESSAGE: &str = "This pull request contains a very large number of changes \
(over 50KB). For best results, consider breaking down large changes into smaller, more \
focused pull requests.";

/// Classification taxonomy for file comments.
///
/// `General` is the catch-all for off-taxonomy labels the model may emit;
/// an unknown category degrades one item instead of failing the whole parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Quality,
    Bug,
    Security,
    Performance,
    Documentation,
    #[default]
    #[serde(other)]
    General,
}

impl Category {
    /// Uppercase label used as the `[CATEGORY]` comment prefix.
    pub fn label(self) -> &'static str {
        match self {
            Category::Quality => "QUALITY",
            Category::Bug => "BUG",
            Category::Security => "SECURITY",
            Category::Performance => "PERFORMANCE",
            Category::Documentation => "DOCUMENTATION",
            Category::General => "GENERAL",
        }
    }
}

/// Line reference exactly as the model emitted it.
///
/// Coercion to an integer is deferred to the inline-post path: a malformed
/// value keeps its item alive through parsing and fails placement there,
/// landing the item in the fallback comment instead of dropping it.
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct LineRef(Value);

impl LineRef {
    /// The line as a positive-capable integer: JSON numbers and numeric
    /// strings coerce, anything else is `None`.
    pub fn coerce(&self) -> Option<i64> {
        match &self.0 {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        }
    }
}

impl fmt::Display for LineRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Value::String(s) => f.write_str(s),
            other => write!(f, "{other}"),
        }
    }
}

impl From<i64> for LineRef {
    fn from(line: i64) -> Self {
        Self(Value::from(line))
    }
}

impl From<&str> for LineRef {
    fn from(raw: &str) -> Self {
        Self(Value::from(raw))
    }
}

/// One inline finding anchored to a file and line.
#[derive(Debug, Clone, Deserialize)]
pub struct FileComment {
    pub file: String,
    pub line_number: LineRef,
    #[serde(default)]
    pub category: Category,
    pub comment: String,
}

/// One suggested documentation block.
#[derive(Debug, Clone, Deserialize)]
pub struct DocNote {
    pub file: String,
    pub line_number: LineRef,
    pub doc_comment: String,
}

/// Structured result of one analysis run. Produced once per webhook
/// invocation; never persisted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReviewResult {
    #[serde(default)]
    pub overall_comment: Option<String>,
    #[serde(default, deserialize_with = "lenient_items")]
    pub file_comments: Vec<FileComment>,
    #[serde(default, deserialize_with = "lenient_items")]
    pub documentation: Vec<DocNote>,
}

impl ReviewResult {
    /// Result carrying only an overall comment (degraded/short-circuit cases).
    pub fn overall_only(comment: impl Into<String>) -> Self {
        Self {
            overall_comment: Some(comment.into()),
            ..Default::default()
        }
    }
}

/// Analyze a diff, returning a well-formed result in every case.
pub async fn analyze_diff(llm: &OpenAiClient, diff: &str) -> ReviewResult {
    if diff.trim().is_empty() {
        warn!("no diff content provided for analysis");
        return ReviewResult::overall_only(NO_CHANGES_MESSAGE);
    }

    info!(size_kb = diff.len() as f64 / 1024.0, "analyzing diff");
    if diff.len() > MAX_ANALYZE_BYTES {
        warn!(bytes = diff.len(), "diff is extremely large, skipping detailed analysis");
        return ReviewResult::overall_only(OVERSIZED_MESSAGE);
    }

    let raw = llm.chat(SYSTEM_MESSAGE, &build_review_prompt(diff)).await;
    parse::parse_review_response(&raw)
}

/// Keep well-formed items, drop the rest. The model sometimes emits entries
/// missing a required field; one bad entry must not sink the whole result.
fn lenient_items<'de, D, T>(de: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: for<'a> Deserialize<'a>,
{
    let raw: Vec<Value> = Vec::deserialize(de)?;
    let total = raw.len();
    let items: Vec<T> = raw
        .into_iter()
        .filter_map(|v| serde_json::from_value(v).ok())
        .collect();
    if items.len() < total {
        warn!(dropped = total - items.len(), "dropped malformed review items");
    }
    Ok(items)
}

const SYSTEM_MESSAGE: &str = r#"You are a senior software engineer with extensive expertise in code quality, security, and performance optimization. Your task is to provide thorough, expert-level code reviews.

IMPORTANT GUIDELINES:
1. Focus on identifying critical issues like security vulnerabilities, performance bottlenecks, logical bugs, and maintainability concerns.
2. Provide specific, actionable feedback that explains both the problem and the recommended solution with appropriate rationale.
3. ALWAYS use proper markdown formatting in your comments:
   - Format code snippets with language-specific code blocks like ```python, ```javascript, etc.
   - Use **bold** for emphasis on important points
   - Use bullet lists for multiple related points
4. For code quality issues, focus on logic, architecture, and best practices.
5. For documentation suggestions, ONLY focus on missing documentation for functions, classes, and complex code blocks.
6. NEVER duplicate the same recommendation in both quality comments and documentation suggestions.
7. Format your response in the required JSON structure exactly as specified."#;

/// User prompt: review instructions, the diff, and the JSON contract.
fn build_review_prompt(diff: &str) -> String {
    format!(
        r#"Perform an expert-level code review on the following diff. Focus specifically on these key areas:

1. CODE QUALITY:
   - Identify non-idiomatic code patterns
   - Flag code complexity, duplications, or hard-to-maintain patterns
   - Suggest cleaner alternatives following language best practices

2. BUGS & LOGIC ISSUES:
   - Identify potential runtime errors, edge cases, or logical flaws
   - Look for incorrect error handling or missing validation
   - Pay special attention to asynchronous operations, state management & error propagation

3. SECURITY VULNERABILITIES:
   - Flag any security issues such as injection risks, unvalidated inputs, or insecure API usage
   - Look for insecure default configurations or leaked credentials
   - Identify potential authorization/authentication bypasses

4. PERFORMANCE OPTIMIZATIONS:
   - Identify inefficient algorithms or data structures
   - Look for unnecessary loops, excessive memory usage, or resource leaks
   - Find redundant operations or computations that could be optimized

5. DOCUMENTATION & READABILITY:
   - Recommend documentation for complex functions, classes or logic
   - Suggest meaningful variable/function names where they're unclear
   - Note where additional comments would improve understanding

```diff
{diff}
```

IMPORTANT: Format your response as JSON with the following fields:
- overall_comment: A thorough summary of the changes covering their purpose, quality, and key concerns
- file_comments: A list of objects with "file", "line_number", "category" (one of: "quality", "bug", "security", "performance", "documentation"), and "comment" for specific issues
- documentation: A list of objects with "file", "line_number", and "doc_comment" for suggested documentation

Example response format:
```json
{{
  "overall_comment": "This PR adds error handling to the user service with generally good practices.",
  "file_comments": [
    {{
      "file": "user_service.py",
      "line_number": 42,
      "category": "security",
      "comment": "This input is used in a database query without validation. Consider parameterized queries."
    }}
  ],
  "documentation": [
    {{
      "file": "user_service.py",
      "line_number": 15,
      "doc_comment": "Document the expected parameters and the error conditions of this function."
    }}
  ]
}}
```

Be specific and detailed in your comments, including rationale for why issues matter and clear recommendations on how to address them."#
    )
}
