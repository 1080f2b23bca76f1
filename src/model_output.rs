//! Post-processing for chat-completion text that should contain JSON.
//!
//! Models wrap JSON in markdown fences and sometimes stop mid-array when they
//! hit the token limit. The steps here are kept separate so each one is a
//! pure function over text:
//!
//! 1. [`strip_code_fence`] removes an optional ```` ``` ```` / ```` ```json ```` wrapper.
//! 2. [`repair_truncated_array`] closes an array that lost its tail, keeping
//!    only the elements that were completely emitted.
//! 3. [`parse_json_array`] runs both, checks the shape, and parses.

use std::borrow::Cow;

use serde_json::Value;

use crate::error::{Error, Result};

/// Remove a surrounding markdown code fence, if present, and trim.
///
/// The body runs from the line after the first fence line to the line before
/// the last line that is exactly ```` ``` ````. Text that does not start with a
/// fence is only trimmed, so applying this twice is the same as applying it once.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return trimmed;
    }

    let lines: Vec<&str> = trimmed.split('\n').collect();
    let start = lines
        .iter()
        .position(|l| l.trim().starts_with("```"))
        .map(|i| i + 1)
        .unwrap_or(0);
    let end = lines
        .iter()
        .rposition(|l| l.trim() == "```")
        .filter(|&i| i >= start)
        .unwrap_or(lines.len());

    if start >= end {
        return "";
    }

    // Slice the original text so the result borrows from the input.
    let begin: usize = lines[..start].iter().map(|l| l.len() + 1).sum();
    let finish: usize = begin
        + lines[start..end].iter().map(|l| l.len()).sum::<usize>()
        + (end - start - 1);
    trimmed[begin..finish].trim()
}

/// Close a JSON array whose tail was cut off.
///
/// Text that does not open an array, or whose opening `[` is matched by a
/// closing `]`, is returned unchanged. Otherwise the text is cut after the
/// last top-level element that closed with `}` and re-closed with `]`.
/// Returns `None` when no complete element exists.
pub fn repair_truncated_array(text: &str) -> Option<Cow<'_, str>> {
    let trimmed = text.trim();
    if !trimmed.starts_with('[') {
        return Some(Cow::Borrowed(text));
    }

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    let mut last_complete: Option<usize> = None;

    for (idx, ch) in trimmed.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '[' | '{' => depth += 1,
            ']' | '}' => {
                depth = depth.saturating_sub(1);
                if ch == '}' && depth == 1 {
                    last_complete = Some(idx);
                }
            }
            _ => {}
        }
    }

    if depth == 0 && !in_string {
        return Some(Cow::Borrowed(text));
    }

    let end = last_complete?;
    Some(Cow::Owned(format!("{}\n]", &trimmed[..=end])))
}

/// Strip, validate, repair and parse model text into JSON.
///
/// Fails with [`Error::MalformedModelOutput`] when the stripped text is not
/// array- or object-shaped, when a truncated array cannot be repaired, or
/// when the result does not parse.
pub fn parse_model_json(content: &str) -> Result<Value> {
    let stripped = strip_code_fence(content);
    if !stripped.starts_with('[') && !stripped.starts_with('{') {
        return Err(Error::MalformedModelOutput(format!(
            "content does not start with '[' or '{{': {}",
            preview(stripped)
        )));
    }

    let repaired = repair_truncated_array(stripped).ok_or_else(|| {
        Error::MalformedModelOutput("truncated array has no complete element".to_string())
    })?;
    if matches!(repaired, Cow::Owned(_)) {
        tracing::debug!("repaired truncated JSON array in model output");
    }

    serde_json::from_str(&repaired)
        .map_err(|e| Error::MalformedModelOutput(format!("{}: {}", e, preview(&repaired))))
}

/// Like [`parse_model_json`], but the result must be an array.
pub fn parse_json_array(content: &str) -> Result<Vec<Value>> {
    match parse_model_json(content)? {
        Value::Array(items) => Ok(items),
        other => Err(Error::MalformedModelOutput(format!(
            "expected a JSON array, got {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// First 200 characters, for log and error messages.
pub(crate) fn preview(text: &str) -> &str {
    match text.char_indices().nth(200) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
