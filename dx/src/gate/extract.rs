//! Pull a JSON value out of free-form model text
//!
//! Tried in order: the whole text, the first fenced ```json block (or any
//! fenced block), then the outermost `{ ... }` span.

use serde_json::Value;
use tracing::debug;

/// Best-effort parse of structured output embedded in text
pub fn extract_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        debug!("extract_json: raw parse");
        return Some(value);
    }

    if let Some(block) = fenced_block(trimmed)
        && let Ok(value) = serde_json::from_str::<Value>(block.trim())
    {
        debug!("extract_json: fenced block");
        return Some(value);
    }

    if let Some(span) = brace_span(trimmed)
        && let Ok(value) = serde_json::from_str::<Value>(span)
    {
        debug!("extract_json: brace span");
        return Some(value);
    }

    debug!(len = trimmed.len(), "extract_json: nothing parseable");
    None
}

/// Body of the first ```json fence, else of the first fence of any language
fn fenced_block(text: &str) -> Option<&str> {
    fence_body(text, "```json").or_else(|| fence_body(text, "```"))
}

fn fence_body<'a>(text: &'a str, opener: &str) -> Option<&'a str> {
    let start = text.find(opener)? + opener.len();
    let rest = &text[start..];
    // Skip the remainder of the opener line (language tag or whitespace)
    let body_start = rest.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &rest[body_start..];
    let end = body.find("```")?;
    Some(&body[..end])
}

fn brace_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}
