//! The rhetorical role vocabulary assigned to classified sentences.

use serde::{Deserialize, Serialize};

/// One of the fixed rhetorical categories a sentence can carry.
///
/// `None` is the fallback for labels outside the vocabulary, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleTag {
    Facts,
    Issues,
    ArgumentPetitioner,
    ArgumentRespondent,
    Reasoning,
    Decision,
    None,
}

impl RoleTag {
    /// Every role, in display order.
    pub const ALL: [RoleTag; 7] = [
        RoleTag::Facts,
        RoleTag::Issues,
        RoleTag::ArgumentPetitioner,
        RoleTag::ArgumentRespondent,
        RoleTag::Reasoning,
        RoleTag::Decision,
        RoleTag::None,
    ];

    /// Map a free-text label from the model onto the closed vocabulary.
    ///
    /// Total over all inputs: case-insensitive, whitespace-trimmed, and any
    /// unrecognized label maps to `None`.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "facts" | "fact" => Self::Facts,
            "issue" | "issues" => Self::Issues,
            "arguments of petitioner" | "argument (petitioner)" => Self::ArgumentPetitioner,
            "arguments of respondent" | "argument (respondent)" => Self::ArgumentRespondent,
            "reasoning" => Self::Reasoning,
            "decision" => Self::Decision,
            _ => Self::None,
        }
    }

    /// Canonical snake_case name, as serialized on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Facts => "facts",
            Self::Issues => "issues",
            Self::ArgumentPetitioner => "argument_petitioner",
            Self::ArgumentRespondent => "argument_respondent",
            Self::Reasoning => "reasoning",
            Self::Decision => "decision",
            Self::None => "none",
        }
    }
}

impl std::fmt::Display for RoleTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
