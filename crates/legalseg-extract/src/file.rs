//! File text extraction for the supported upload formats.

use std::path::Path;

use docx_rs::{DocumentChild, ParagraphChild, RunChild};
use tracing::warn;

use legalseg_core::{Error, Result};

/// Trimmed extractions shorter than this are rejected as unreadable.
const MIN_TEXT_LEN: usize = 10;

/// Supported upload formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Pdf,
    Docx,
    PlainText,
}

impl FileKind {
    /// Detect the format from a declared extension. Unknown extensions are
    /// rejected here, before any read is attempted.
    pub fn from_extension(ext: &str) -> Result<Self> {
        match ext.trim_start_matches('.').to_lowercase().as_str() {
            "pdf" => Ok(Self::Pdf),
            "doc" | "docx" => Ok(Self::Docx),
            "txt" => Ok(Self::PlainText),
            other => Err(Error::UnsupportedFormat(format!(
                "'{}' — use pdf, docx, or txt",
                other
            ))),
        }
    }
}

/// Extract plain text from an uploaded file.
///
/// The trimmed text must be at least 10 characters; anything shorter fails
/// with `EmptyContent` rather than feeding garbage to the model.
pub fn extract(path: &Path, declared_extension: &str) -> Result<String> {
    let kind = FileKind::from_extension(declared_extension)?;
    let text = match kind {
        FileKind::Pdf => extract_pdf(path)?,
        FileKind::Docx => extract_docx(path)?,
        FileKind::PlainText => std::fs::read_to_string(path)?,
    };
    let trimmed = text.trim();
    if trimmed.chars().count() < MIN_TEXT_LEN {
        return Err(Error::EmptyContent);
    }
    Ok(trimmed.to_string())
}

/// Extract text, then delete the source file whether extraction succeeded
/// or not. Deletion is best-effort: a failure is logged, never propagated.
pub fn extract_and_discard(path: &Path, declared_extension: &str) -> Result<String> {
    let result = extract(path, declared_extension);
    if let Err(e) = std::fs::remove_file(path) {
        if path.exists() {
            warn!("Failed to remove uploaded file {}: {}", path.display(), e);
        }
    }
    result
}

fn extract_pdf(path: &Path) -> Result<String> {
    pdf_extract::extract_text(path).map_err(|e| Error::Extraction(format!("pdf: {}", e)))
}

fn extract_docx(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)?;
    let docx =
        docx_rs::read_docx(&bytes).map_err(|e| Error::Extraction(format!("docx: {}", e)))?;
    Ok(docx_text(&docx))
}

/// Flatten the document body to plain text, one line per paragraph.
/// Only run text is kept; tracked deletions and field codes are not body
/// text.
fn docx_text(docx: &docx_rs::Docx) -> String {
    let mut out = String::new();
    for child in &docx.document.children {
        if let DocumentChild::Paragraph(paragraph) = child {
            for paragraph_child in &paragraph.children {
                if let ParagraphChild::Run(run) = paragraph_child {
                    for run_child in &run.children {
                        match run_child {
                            RunChild::Text(text) => out.push_str(&text.text),
                            RunChild::Tab(_) => out.push('\t'),
                            RunChild::Break(_) => out.push('\n'),
                            _ => {}
                        }
                    }
                }
            }
            out.push('\n');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use docx_rs::{Docx, Paragraph, Run};
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn extracts_plain_text() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "brief.txt", "  The appellant filed a petition.  ");
        let text = extract(&path, "txt").unwrap();
        assert_eq!(text, "The appellant filed a petition.");
    }

    #[test]
    fn short_text_fails_empty_content() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "brief.txt", "   short   ");
        assert!(matches!(extract(&path, "txt"), Err(Error::EmptyContent)));
    }

    #[test]
    fn unsupported_extension_fails_without_reading() {
        let dir = TempDir::new().unwrap();
        // The path deliberately does not exist: the format gate must fire
        // before any read.
        let path = dir.path().join("missing.rtf");
        assert!(matches!(
            extract(&path, "rtf"),
            Err(Error::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn extension_detection_is_case_insensitive() {
        assert_eq!(FileKind::from_extension("PDF").unwrap(), FileKind::Pdf);
        assert_eq!(FileKind::from_extension(".DocX").unwrap(), FileKind::Docx);
        assert_eq!(FileKind::from_extension("doc").unwrap(), FileKind::Docx);
        assert!(FileKind::from_extension("rtf").is_err());
    }

    #[test]
    fn discard_removes_file_on_success() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "brief.txt", "The court rules for the petitioner.");
        let text = extract_and_discard(&path, "txt").unwrap();
        assert!(text.starts_with("The court"));
        assert!(!path.exists());
    }

    #[test]
    fn discard_removes_file_on_failure() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "brief.txt", "short");
        assert!(extract_and_discard(&path, "txt").is_err());
        assert!(!path.exists());
    }

    #[test]
    fn non_docx_doc_fails_extraction() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "legacy.doc", "this is not a docx container at all");
        assert!(matches!(extract(&path, "doc"), Err(Error::Extraction(_))));
    }

    #[test]
    fn docx_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ruling.docx");
        let file = std::fs::File::create(&path).unwrap();
        Docx::new()
            .add_paragraph(
                Paragraph::new()
                    .add_run(Run::new().add_text("The court held that the appeal fails.")),
            )
            .add_paragraph(Paragraph::new().add_run(Run::new().add_text("Costs follow the event.")))
            .build()
            .pack(file)
            .unwrap();

        let text = extract(&path, "docx").unwrap();
        assert_eq!(
            text,
            "The court held that the appeal fails.\nCosts follow the event."
        );
    }

    #[test]
    fn docx_text_flattens_paragraphs_and_runs() {
        let docx = Docx::new()
            .add_paragraph(
                Paragraph::new()
                    .add_run(Run::new().add_text("The petition "))
                    .add_run(Run::new().add_text("was dismissed.")),
            )
            .add_paragraph(Paragraph::new().add_run(Run::new().add_text("So ordered.")));
        assert_eq!(
            docx_text(&docx),
            "The petition was dismissed.\nSo ordered.\n"
        );
    }
}
