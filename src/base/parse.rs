//! Lenient extraction of structured data from model replies.
//!
//! Models wrap JSON in fenced blocks, prefix it with prose, or return garbage.
//! These helpers only ever return `None` on failure; they never panic or error.

use std::sync::OnceLock;

use regex::Regex;

static FENCED_BLOCK: OnceLock<Regex> = OnceLock::new();

fn fenced_block_regex() -> &'static Regex {
    FENCED_BLOCK.get_or_init(|| Regex::new(r"(?s)```[A-Za-z0-9_-]*[ \t]*\r?\n?(.*?)```").expect("fenced block pattern is valid"))
}

/// Inner text of the first fenced code block, if there is one.
pub fn extract_fenced_block(text: &str) -> Option<&str> {
    fenced_block_regex().captures(text).and_then(|c| c.get(1)).map(|m| m.as_str().trim())
}

/// The span from the first `[` through the last `]`, when both exist in that order.
pub fn bracketed_span(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;

    (start < end).then(|| &text[start..=end])
}

/// Parse a non-empty JSON array of strings out of a model reply.
///
/// The fenced block (if any) is preferred over the raw text, then the outermost
/// bracketed span is parsed. Arrays holding anything other than strings, and
/// empty arrays, are rejected.
pub fn parse_string_array(text: &str) -> Option<Vec<String>> {
    let candidate = extract_fenced_block(text).unwrap_or(text);
    let span = bracketed_span(candidate)?;
    let values = serde_json::from_str::<Vec<String>>(span).ok()?;

    (!values.is_empty()).then_some(values)
}

// Tests.
