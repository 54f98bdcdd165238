//! Routing of raw completions.
//!
//! The text model is asked to answer in one of two shapes:
//!
//! ```text
//! Assistant: <message>
//! Generation: <count>x"<image prompt>"
//! ```
//!
//! The check is purely syntactic. Completions are untrusted, so anything
//! that does not contain a generation directive is treated as a chat reply.

use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

/// ASCII digits only; the prompt stops at the first closing quote.
static GENERATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"Generation:\s([0-9]+)x"([^"\n]+)""#).unwrap());

const ASSISTANT_PREFIX: &str = "Assistant: ";

/// What a completion asks the client to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Show this chat reply.
    Assistant(String),

    /// Generate `count` images from `prompt`.
    Generation { count: u32, prompt: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClassifyError {
    /// The directive matched but its count is zero or too large.
    #[error("Invalid image count: {0}")]
    InvalidCount(String),
}

/// Classify a completion from the text endpoint.
pub fn classify(completion: &str) -> Result<Classification, ClassifyError> {
    let Some(captures) = GENERATION_RE.captures(completion) else {
        return Ok(Classification::Assistant(strip_assistant_prefix(completion)));
    };

    let raw_count = &captures[1];
    let count = match raw_count.parse::<u32>() {
        Ok(n) if n > 0 => n,
        _ => return Err(ClassifyError::InvalidCount(raw_count.to_string())),
    };

    Ok(Classification::Generation {
        count,
        prompt: captures[2].to_string(),
    })
}

/// Drop a leading `Assistant: ` label (after any leading whitespace).
/// Text without the label is returned unchanged.
fn strip_assistant_prefix(completion: &str) -> String {
    match completion.trim_start().strip_prefix(ASSISTANT_PREFIX) {
        Some(rest) => rest.to_string(),
        None => completion.to_string(),
    }
}
