//! Parsing of model output that may be wrapped in Markdown code fences
//!
//! Models often answer "```json\n{...}\n```" even when asked for bare JSON.
//! Parsing is strict in two passes: the trimmed text as-is, then the body of
//! the first fenced block. Anything else is a typed error, never a default.

use regex::Regex;
use serde::de::DeserializeOwned;
use std::sync::OnceLock;

/// How the payload was found in the model's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    Fenced,
    Raw,
}

impl std::fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PayloadKind::Fenced => f.write_str("fenced"),
            PayloadKind::Raw => f.write_str("raw"),
        }
    }
}

/// Tagged view of a response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload<'a> {
    Fenced { lang: Option<&'a str>, body: &'a str },
    Raw(&'a str),
}

impl<'a> Payload<'a> {
    pub fn kind(&self) -> PayloadKind {
        match self {
            Payload::Fenced { .. } => PayloadKind::Fenced,
            Payload::Raw(_) => PayloadKind::Raw,
        }
    }

    pub fn body(&self) -> &'a str {
        match self {
            Payload::Fenced { body, .. } => body,
            Payload::Raw(body) => body,
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid {kind} JSON payload: {message} (near {snippet:?})")]
pub struct ParseError {
    pub kind: PayloadKind,
    pub message: String,
    pub snippet: String,
}

const SNIPPET_CHARS: usize = 120;

fn fence_regex() -> Option<&'static Regex> {
    static FENCE: OnceLock<Option<Regex>> = OnceLock::new();
    FENCE
        .get_or_init(|| Regex::new(r"(?s)```[ \t]*([A-Za-z0-9_+.#-]*)[^\n]*\n(.*?)```").ok())
        .as_ref()
}

/// Locate the first fenced block, or fall back to the whole trimmed text.
pub fn extract_payload(text: &str) -> Payload<'_> {
    if let Some(caps) = fence_regex().and_then(|re| re.captures(text)) {
        if let Some(body) = caps.get(2) {
            let lang = caps
                .get(1)
                .map(|m| m.as_str())
                .filter(|l| !l.is_empty());
            return Payload::Fenced {
                lang,
                body: body.as_str().trim(),
            };
        }
    }
    Payload::Raw(text.trim())
}

/// Strip fence wrapping from a code answer. Unfenced text is returned trimmed.
pub fn strip_code_fences(text: &str) -> String {
    extract_payload(text).body().to_string()
}

/// Strict two-pass JSON parse of a model response.
pub fn parse_json<T: DeserializeOwned>(text: &str) -> Result<T, ParseError> {
    if let Ok(value) = serde_json::from_str::<T>(text.trim()) {
        return Ok(value);
    }

    let payload = extract_payload(text);
    serde_json::from_str::<T>(payload.body()).map_err(|e| ParseError {
        kind: payload.kind(),
        message: e.to_string(),
        snippet: payload.body().chars().take(SNIPPET_CHARS).collect(),
    })
}
