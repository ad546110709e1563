//! Normalization of raw inference payloads into labeled sentences.
//!
//! The model's answer arrives in one of two shapes: markdown-ish lines
//! (`**Role** | sentence`) or structured records with label/sentence fields —
//! sometimes the whole answer is additionally packed into a single
//! JSON-encoded string. Classification into an explicit [`Payload`] happens
//! first; each shape then has one dedicated path. Normalization is total:
//! the worst case is an empty result with the problem logged.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::warn;

use crate::stream::unescape_quotes;
use legalseg_core::{LabeledSentence, RoleTag};

static LINE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\*\*(.+?)\*\*\s*\|\s*(.+)$").unwrap());

/// Fields consulted, in order, for a record's sentence text.
const TEXT_FIELDS: [&str; 4] = ["sentence", "text", "output", "value"];
/// Fields consulted, in order, for a record's role label.
const LABEL_FIELDS: [&str; 3] = ["label", "role", "tag"];

/// The two shapes a recovered payload can take.
#[derive(Debug)]
enum Payload {
    /// Every element is a string; sentences are parsed out of lines.
    Lines(Vec<String>),
    /// At least one structured record; fields are read per element.
    Records(Vec<Value>),
}

/// Turn a raw payload into an ordered sequence of labeled sentences.
pub fn normalize(raw: &[Value]) -> Vec<LabeledSentence> {
    match classify(raw) {
        Payload::Lines(lines) => normalize_lines(&lines),
        Payload::Records(records) => normalize_records(&records),
    }
}

fn classify(raw: &[Value]) -> Payload {
    // A first element like "[[..." means the whole answer is one
    // JSON-encoded string.
    let mut working: Vec<Value> = match raw.first() {
        Some(Value::String(s)) if s.trim_start().starts_with("[[") => unwrap_nested(s),
        _ => raw.to_vec(),
    };

    // The service wraps its answer in one extra array layer.
    if working.len() == 1 {
        if let Value::Array(inner) = &working[0] {
            working = inner.clone();
        }
    }

    if working.iter().all(|v| v.is_string()) {
        Payload::Lines(
            working
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
        )
    } else {
        Payload::Records(working)
    }
}

/// Parse a JSON-encoded payload string. Any failure yields an empty working
/// array — logged, never propagated.
fn unwrap_nested(encoded: &str) -> Vec<Value> {
    let stripped: String = encoded.chars().filter(|c| !c.is_control()).collect();
    let cleaned = unescape_quotes(&stripped);

    match serde_json::from_str::<Value>(&cleaned) {
        Ok(Value::Array(items)) => match items.first() {
            Some(Value::Array(inner)) => inner.clone(),
            _ => items,
        },
        Ok(other) => vec![other],
        Err(e) => {
            warn!("nested inference payload did not parse: {}", e);
            Vec::new()
        }
    }
}

fn normalize_lines(lines: &[String]) -> Vec<LabeledSentence> {
    let joined = lines.join("\n");
    let mut sentences = Vec::new();
    for line in joined.lines() {
        if let Some(sentence) = parse_line(line, sentences.len() as u32 + 1) {
            sentences.push(sentence);
        }
    }
    sentences
}

/// Match one `**Role** | sentence` line. Anything else is silently dropped.
fn parse_line(line: &str, original_index: u32) -> Option<LabeledSentence> {
    let caps = LINE_PATTERN.captures(line.trim())?;
    let label = caps.get(1)?.as_str();
    let text = caps.get(2)?.as_str().trim();
    if text.is_empty() {
        return None;
    }
    Some(LabeledSentence {
        text: text.to_string(),
        role_id: RoleTag::from_label(label),
        confidence: 1.0,
        original_index,
    })
}

fn normalize_records(records: &[Value]) -> Vec<LabeledSentence> {
    let mut sentences = Vec::new();
    for (position, record) in records.iter().enumerate() {
        // Record payloads keep their array position even when earlier
        // elements were dropped.
        let original_index = position as u32 + 1;
        match record {
            Value::Object(fields) => {
                let text = TEXT_FIELDS
                    .iter()
                    .find_map(|f| fields.get(*f).and_then(|v| v.as_str()))
                    .map(str::trim)
                    .filter(|t| !t.is_empty());
                let Some(text) = text else { continue };

                let label = LABEL_FIELDS
                    .iter()
                    .find_map(|f| fields.get(*f).and_then(|v| v.as_str()))
                    .unwrap_or("");

                sentences.push(LabeledSentence {
                    text: text.to_string(),
                    role_id: RoleTag::from_label(label),
                    confidence: confidence_of(fields),
                    original_index,
                });
            }
            other => {
                // Stray line-mode entries inside a record payload.
                let Some(line) = other.as_str() else { continue };
                if let Some(sentence) = parse_line(line, original_index) {
                    sentences.push(sentence);
                }
            }
        }
    }
    sentences
}

/// Confidence arrives on a 0–1 or 0–100 scale depending on the model build;
/// canonical output is 0–1, defaulting to 1.0 when absent.
fn confidence_of(fields: &serde_json::Map<String, Value>) -> f64 {
    let raw = ["confidence", "score"]
        .iter()
        .find_map(|f| fields.get(*f).and_then(|v| v.as_f64()));
    match raw {
        Some(v) if v > 1.0 => (v / 100.0).clamp(0.0, 1.0),
        Some(v) if v >= 0.0 => v,
        _ => 1.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lines_round_trip() {
        let raw = vec![json!("**Facts** | A."), json!("**Issues** | B.")];
        let sentences = normalize(&raw);
        assert_eq!(sentences.len(), 2);
        assert_eq!(sentences[0].text, "A.");
        assert_eq!(sentences[0].role_id, RoleTag::Facts);
        assert_eq!(sentences[0].original_index, 1);
        assert_eq!(sentences[1].text, "B.");
        assert_eq!(sentences[1].role_id, RoleTag::Issues);
        assert_eq!(sentences[1].original_index, 2);
    }

    #[test]
    fn unmatched_lines_are_dropped_and_indices_compact() {
        let raw = vec![
            json!("**Facts** | The petition was filed."),
            json!("just prose, no marker"),
            json!("**Decision** | Appeal dismissed."),
        ];
        let sentences = normalize(&raw);
        assert_eq!(sentences.len(), 2);
        // Line mode indexes matched lines, not source lines.
        assert_eq!(sentences[1].original_index, 2);
        assert_eq!(sentences[1].role_id, RoleTag::Decision);
    }

    #[test]
    fn multi_line_string_elements_are_split() {
        let raw = vec![json!("**Facts** | A.\n**Reasoning** | B.")];
        let sentences = normalize(&raw);
        assert_eq!(sentences.len(), 2);
        assert_eq!(sentences[1].role_id, RoleTag::Reasoning);
    }

    #[test]
    fn records_extract_fields() {
        let raw = vec![
            json!({"label": "Facts", "sentence": "The petition was filed."}),
            json!({"label": "Decision", "sentence": "Appeal dismissed."}),
        ];
        let sentences = normalize(&raw);
        assert_eq!(sentences.len(), 2);
        assert_eq!(sentences[0].role_id, RoleTag::Facts);
        assert_eq!(sentences[0].confidence, 1.0);
        assert_eq!(sentences[1].original_index, 2);
    }

    #[test]
    fn record_field_priority_is_respected() {
        let raw = vec![json!({
            "role": "Reasoning",
            "text": "fallback text",
            "sentence": "primary text",
        })];
        let sentences = normalize(&raw);
        assert_eq!(sentences[0].text, "primary text");
        assert_eq!(sentences[0].role_id, RoleTag::Reasoning);
    }

    #[test]
    fn unknown_labels_map_to_none_not_error() {
        let raw = vec![json!({"label": "Prologue", "sentence": "Once upon a time."})];
        let sentences = normalize(&raw);
        assert_eq!(sentences[0].role_id, RoleTag::None);
    }

    #[test]
    fn records_without_text_keep_array_positions() {
        let raw = vec![
            json!({"label": "Facts"}),
            json!({"label": "Decision", "sentence": "Appeal dismissed."}),
        ];
        let sentences = normalize(&raw);
        assert_eq!(sentences.len(), 1);
        // Array position 2, even though element 1 was dropped.
        assert_eq!(sentences[0].original_index, 2);
    }

    #[test]
    fn nested_encoded_payload_is_unwrapped() {
        let raw = vec![json!("[[{\"label\":\"Facts\",\"sentence\":\"A.\"}]]")];
        let sentences = normalize(&raw);
        assert_eq!(sentences.len(), 1);
        assert_eq!(sentences[0].text, "A.");
        assert_eq!(sentences[0].role_id, RoleTag::Facts);
    }

    #[test]
    fn nested_payload_with_escaped_quotes_is_unwrapped() {
        let encoded = "[[{\\\"label\\\":\\\"Decision\\\",\\\"sentence\\\":\\\"Appeal dismissed.\\\"}]]";
        let raw = vec![json!(encoded)];
        let sentences = normalize(&raw);
        assert_eq!(sentences.len(), 1);
        assert_eq!(sentences[0].role_id, RoleTag::Decision);
    }

    #[test]
    fn broken_nested_payload_yields_empty() {
        let raw = vec![json!("[[{\"label\": truncated")];
        assert!(normalize(&raw).is_empty());
    }

    #[test]
    fn extra_array_layer_is_unwrapped() {
        let raw = vec![json!([
            {"label": "Facts", "sentence": "The petition was filed."},
            {"label": "Decision", "sentence": "Appeal dismissed."},
        ])];
        let sentences = normalize(&raw);
        assert_eq!(sentences.len(), 2);
        assert_eq!(sentences[1].role_id, RoleTag::Decision);
    }

    #[test]
    fn percentage_confidence_is_rescaled() {
        let raw = vec![json!({"label": "Facts", "sentence": "A.", "confidence": 87})];
        let sentences = normalize(&raw);
        assert!((sentences[0].confidence - 0.87).abs() < 1e-9);
    }

    #[test]
    fn fractional_confidence_is_kept() {
        let raw = vec![json!({"label": "Facts", "sentence": "A.", "score": 0.42})];
        let sentences = normalize(&raw);
        assert!((sentences[0].confidence - 0.42).abs() < 1e-9);
    }

    #[test]
    fn empty_payload_yields_empty() {
        assert!(normalize(&[]).is_empty());
    }
}
