//! Normalization of model output before JSON parsing.
//!
//! Generative models frequently wrap the requested JSON object in Markdown
//! code fences despite being told not to. Accepted input variants:
//!
//! * the bare JSON text;
//! * the same text wrapped in ``` or ```json fences (tag matched
//!   case-insensitively), with or without a trailing fence;
//! * any of the above surrounded by whitespace.
//!
//! All variants normalize to the identical trimmed string, and the function
//! is idempotent on its own output.

use once_cell::sync::Lazy;
use regex::Regex;

static FENCE_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*```(?:json)?\s*").expect("fence-open regex is valid"));
static FENCE_CLOSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*```\s*$").expect("fence-close regex is valid"));

/// Strip surrounding Markdown code fences and whitespace from model output.
pub fn strip_code_fences(text: &str) -> String {
    let opened = FENCE_OPEN.replace(text, "");
    let closed = FENCE_CLOSE.replace(&opened, "");
    closed.trim().to_string()
}
