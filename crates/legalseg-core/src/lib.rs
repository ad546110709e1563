//! LegalSeg Core — errors, configuration, role vocabulary, result types.

pub mod config;
pub mod error;
pub mod roles;
pub mod types;

pub use config::{DataPaths, LegalSegConfig};
pub use error::{Error, Result};
pub use roles::RoleTag;
pub use types::{AnalysisResult, CaseRecord, LabeledSentence, PredictionRecord};
