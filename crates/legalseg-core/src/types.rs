//! Result and record types shared across the workspace.
//!
//! Wire names are camelCase because the API was consumed by a JS front end
//! (`sentenceCount`, `avgConfidence`, `roleId`).

use serde::{Deserialize, Serialize};

use crate::roles::RoleTag;

/// One classified sentence, in model output order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabeledSentence {
    pub text: String,
    pub role_id: RoleTag,
    /// Canonical 0.0–1.0 scale.
    pub confidence: f64,
    /// 1-based position reported by the normalizer; never re-sorted.
    pub original_index: u32,
}

/// The outcome of one analysis run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub summary: String,
    pub sentences: Vec<LabeledSentence>,
    pub avg_confidence: f64,
}

impl AnalysisResult {
    /// Assemble a result from normalized sentences, deriving the summary and
    /// the mean confidence (0.0 for an empty sequence).
    pub fn from_sentences(sentences: Vec<LabeledSentence>) -> Self {
        let avg_confidence = if sentences.is_empty() {
            0.0
        } else {
            sentences.iter().map(|s| s.confidence).sum::<f64>() / sentences.len() as f64
        };
        let summary = summarize(&sentences);
        Self {
            summary,
            sentences,
            avg_confidence,
        }
    }
}

fn summarize(sentences: &[LabeledSentence]) -> String {
    if sentences.is_empty() {
        return "No sentences recognized in the model output".to_string();
    }
    let leading = RoleTag::ALL
        .iter()
        .copied()
        .max_by_key(|role| sentences.iter().filter(|s| s.role_id == *role).count())
        .unwrap_or(RoleTag::None);
    format!(
        "{} sentences classified, leading role: {}",
        sentences.len(),
        leading
    )
}

/// The persisted summary of one analyzed document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseRecord {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stored_filename: Option<String>,
    /// RFC 3339 timestamp of the analysis.
    pub date: String,
    pub sentence_count: usize,
    pub status: String,
    pub results: AnalysisResult,
}

impl CaseRecord {
    /// Build a completed case. `sentence_count` is derived from the results
    /// so the two can never disagree.
    pub fn completed(
        id: String,
        title: String,
        stored_filename: Option<String>,
        date: String,
        results: AnalysisResult,
    ) -> Self {
        Self {
            id,
            title,
            stored_filename,
            date,
            sentence_count: results.sentences.len(),
            status: "completed".to_string(),
            results,
        }
    }
}

/// The flat per-analysis record written alongside the case.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionRecord {
    pub id: String,
    /// Uploaded filename, or "text" for pasted input.
    pub source: String,
    pub sentence_count: usize,
    pub avg_confidence: f64,
    pub sentences: Vec<LabeledSentence>,
    /// RFC 3339 timestamp.
    pub created_at: String,
}
