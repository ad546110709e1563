//! Configuration and data directory management.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default base URL of the hosted segmentation model.
pub const DEFAULT_INFERENCE_BASE_URL: &str =
    "https://prateek0515-legal-document-segmentation.hf.space";

/// Paths to all LegalSeg data directories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPaths {
    /// Root data directory (e.g., `data/`).
    pub root: PathBuf,
    /// Case database directory (`data/casedb/`).
    pub casedb: PathBuf,
    /// Transient spool for uploaded files (`data/uploads/`).
    pub uploads: PathBuf,
    /// Failed persistence writes (`data/dead-letter.jsonl`).
    pub dead_letter_file: PathBuf,
}

impl DataPaths {
    /// Create data paths from a root directory. Creates directories if needed.
    pub fn new(root: impl AsRef<Path>) -> std::io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        let paths = Self {
            casedb: root.join("casedb"),
            uploads: root.join("uploads"),
            dead_letter_file: root.join("dead-letter.jsonl"),
            root,
        };
        paths.ensure_dirs()?;
        Ok(paths)
    }

    /// Create all required directories.
    fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.casedb)?;
        std::fs::create_dir_all(&self.uploads)?;
        Ok(())
    }
}

/// Top-level LegalSeg configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegalSegConfig {
    /// HTTP server port.
    pub port: u16,
    /// Data directory paths.
    pub data_paths: DataPaths,
    /// Base URL of the remote inference service.
    pub inference_base_url: String,
}

impl LegalSegConfig {
    /// Create configuration from environment and defaults.
    pub fn from_env(data_dir: impl AsRef<Path>) -> std::io::Result<Self> {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(4000);

        let inference_base_url = std::env::var("INFERENCE_BASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty())
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_INFERENCE_BASE_URL.to_string());

        let data_paths = DataPaths::new(data_dir)?;

        Ok(Self {
            port,
            data_paths,
            inference_base_url,
        })
    }
}
