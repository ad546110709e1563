//! Text extraction for uploaded legal documents.

pub mod file;

pub use file::{extract, extract_and_discard, FileKind};
