//! Extension → fence-language lookup tables.
//!
//! Plain configuration data, not dispatch. Two tables on purpose: code
//! fences inside review comments only get annotated when the language is
//! known, while documentation snippets always get a tag (falling back to
//! `text`) and cover a narrower set.

const FENCE_LANGUAGES: &[(&[&str], &str)] = &[
    (&["py", "pyw"], "python"),
    (&["js", "jsx"], "javascript"),
    (&["ts", "tsx"], "typescript"),
    (&["html", "htm"], "html"),
    (&["css"], "css"),
    (&["java"], "java"),
    (&["c", "cpp", "cc", "h", "hpp"], "cpp"),
    (&["rb"], "ruby"),
    (&["go"], "go"),
    (&["php"], "php"),
];

const DOC_LANGUAGES: &[(&[&str], &str)] = &[
    (&["py", "pyw"], "python"),
    (&["js", "jsx"], "javascript"),
    (&["ts", "tsx"], "typescript"),
    (&["java"], "java"),
    (&["c", "cpp", "cc", "h", "hpp"], "cpp"),
];

fn extension(path: &str) -> Option<String> {
    std::path::Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
}

/// Fence language for review comments; `None` leaves the fence untagged.
pub fn language_for_path(path: &str) -> Option<&'static str> {
    let ext = extension(path)?;
    FENCE_LANGUAGES
        .iter()
        .find(|(exts, _)| exts.contains(&ext.as_str()))
        .map(|(_, lang)| *lang)
}

/// Fence language for documentation snippets, defaulting to `text`.
pub fn doc_language_for_path(path: &str) -> &'static str {
    extension(path)
        .and_then(|ext| {
            DOC_LANGUAGES
                .iter()
                .find(|(exts, _)| exts.contains(&ext.as_str()))
                .map(|(_, lang)| *lang)
        })
        .unwrap_or("text")
}
