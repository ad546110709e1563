//! Payload recovery from the status endpoint's event-stream text.
//!
//! The status channel is not a clean JSON API: bodies are `event:`/`data:`
//! line text, and the result array arrives escaped or double-encoded
//! depending on the model build. Recovery is defensive at every step; a
//! malformed body means "not ready", never a hard failure.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static DATA_ARRAY: Lazy<Regex> = Lazy::new(|| Regex::new(r"data:\s*(\[.*\])").unwrap());

/// Whether the body carries the service's terminal error marker.
pub fn contains_error_event(body: &str) -> bool {
    body.contains("event: error")
}

/// Recover the result payload from a status body, if one is present.
///
/// The last `data: [...]` match wins. `None` means no bracketed array was
/// found and the job is still running.
pub fn recover_payload(body: &str) -> Option<Vec<Value>> {
    let captured = DATA_ARRAY
        .captures_iter(body)
        .last()
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())?;

    let unescaped = unescape(captured);
    match serde_json::from_str::<Value>(&unescaped) {
        Ok(Value::Array(items)) => Some(items),
        Ok(other) => Some(vec![other]),
        // Double-encoded or mangled JSON: hand the string to the normalizer,
        // which knows how to unwrap nested encodings.
        Err(_) => Some(vec![Value::String(unescaped)]),
    }
}

/// Resolve the escape sequences the stream leaves in captured text: literal
/// `\n`, escaped quotes, and `\uXXXX` code points.
pub fn unescape(text: &str) -> String {
    resolve_escapes(text, true)
}

/// Like [`unescape`] but leaves `\n` sequences alone, for text that must
/// still parse as a JSON document afterwards.
pub(crate) fn unescape_quotes(text: &str) -> String {
    resolve_escapes(text, false)
}

fn resolve_escapes(text: &str, newlines: bool) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some('n') if newlines => {
                chars.next();
                out.push('\n');
            }
            Some('"') => {
                chars.next();
                out.push('"');
            }
            Some('u') => {
                chars.next();
                let code: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&code, 16).ok().and_then(char::from_u32) {
                    Some(decoded) => out.push(decoded),
                    None => {
                        out.push_str("\\u");
                        out.push_str(&code);
                    }
                }
            }
            _ => out.push('\\'),
        }
    }
    out
}
