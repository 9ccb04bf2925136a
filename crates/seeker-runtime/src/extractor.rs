//! Recover a JSON object from free-form model output.
//!
//! Models wrap JSON in prose, code fences or both. [`extract_json_object`]
//! tries three strategies in order and returns the first object that parses:
//!
//! 1. a ```` ```json ```` fenced block;
//! 2. a string-safe balanced-brace scan starting at the first `{`
//!    ([`BraceScanner`]);
//! 3. a regex over brace-delimited substrings (at most one level of nesting),
//!    keeping the first match that parses to an object.
//!
//! Arrays and scalars never count as a result. Failure is `None`, never a
//! panic.
//!
//! ```
//! use seeker_runtime::extractor::extract_json_object;
//!
//! let text = r#"Sure! {"action": "explore", "note": "use } carefully"} Done."#;
//! let obj = extract_json_object(text).unwrap();
//! assert_eq!(obj["note"], "use } carefully");
//!
//! assert!(extract_json_object(r#"{"action": "explore""#).is_none());
//! ```

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

static FENCED_JSON: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?s)```json\s*\n(.*?)\n```").ok());

static FLAT_OBJECT: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\{[^{}]*(?:\{[^{}]*\}[^{}]*)*\}").ok());

/// Extract the first JSON object embedded in `text`.
pub fn extract_json_object(text: &str) -> Option<Map<String, Value>> {
    if text.is_empty() {
        return None;
    }
    from_fence(text)
        .or_else(|| from_balanced_scan(text))
        .or_else(|| from_regex(text))
}

fn parse_object(candidate: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(candidate) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

fn from_fence(text: &str) -> Option<Map<String, Value>> {
    let re = FENCED_JSON.as_ref()?;
    let body = re.captures(text)?.get(1)?.as_str().trim();
    parse_object(body)
}

fn from_balanced_scan(text: &str) -> Option<Map<String, Value>> {
    let start = text.find('{')?;
    let end = BraceScanner::default().find_close(&text[start..])?;
    parse_object(&text[start..start + end])
}

fn from_regex(text: &str) -> Option<Map<String, Value>> {
    let re = FLAT_OBJECT.as_ref()?;
    re.find_iter(text).find_map(|m| parse_object(m.as_str()))
}

// ─────────────────────────────────────────────────────────────────────────────
// Balanced-brace state machine
// ─────────────────────────────────────────────────────────────────────────────

/// Brace counter that ignores braces inside quoted strings.
///
/// A backslash escapes the next character, so `\"` does not toggle the
/// string state.
#[derive(Debug, Default)]
pub struct BraceScanner {
    depth: usize,
    in_string: bool,
    escaped: bool,
}

impl BraceScanner {
    /// Byte offset just past the brace closing the object that starts at
    /// `text[0]`, or `None` if it never closes.
    pub fn find_close(mut self, text: &str) -> Option<usize> {
        for (i, c) in text.char_indices() {
            if self.escaped {
                self.escaped = false;
                continue;
            }
            match c {
                '\\' => self.escaped = true,
                '"' => self.in_string = !self.in_string,
                '{' if !self.in_string => self.depth += 1,
                '}' if !self.in_string => {
                    self.depth = self.depth.checked_sub(1)?;
                    if self.depth == 0 {
                        return Some(i + c.len_utf8());
                    }
                }
                _ => {}
            }
        }
        None
    }
}
