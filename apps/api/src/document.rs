//! Raw document intake: the black-box text producer in front of the pipeline.
//!
//! PDF goes through `pdf-extract`, DOCX through `docx-rs`, plain text is decoded
//! lossily. Anything else is rejected with `UnsupportedFormat` before the
//! normalizer ever runs.

use std::path::Path;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::PipelineError;

/// Declared format of an uploaded document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentFormat {
    Pdf,
    Docx,
    PlainText,
}

impl DocumentFormat {
    /// Resolves the format from a file name's extension (case-insensitive).
    ///
    /// Legacy `.doc` is not accepted: `docx-rs` only reads the OOXML container.
    pub fn from_file_name(file_name: &str) -> Result<Self, PipelineError> {
        let extension = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "pdf" => Ok(DocumentFormat::Pdf),
            "docx" => Ok(DocumentFormat::Docx),
            "txt" | "text" | "md" => Ok(DocumentFormat::PlainText),
            "" => Err(PipelineError::UnsupportedFormat(format!(
                "'{file_name}' has no file extension"
            ))),
            other => Err(PipelineError::UnsupportedFormat(format!(".{other}"))),
        }
    }
}

/// Opaque document bytes plus declared format. Never mutated after intake.
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub id: String,
    pub file_name: Option<String>,
    pub format: DocumentFormat,
    pub content: Bytes,
}

impl RawDocument {
    pub fn new(id: impl Into<String>, format: DocumentFormat, content: impl Into<Bytes>) -> Self {
        Self {
            id: id.into(),
            file_name: None,
            format,
            content: content.into(),
        }
    }

    /// Wraps already-extracted text, e.g. from a batch job runner.
    pub fn plain_text(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(id, DocumentFormat::PlainText, Bytes::from(text.into()))
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }
}

/// Builds a document id from the upload's file stem plus a short random suffix,
/// so two uploads of `cv.pdf` in one batch stay distinguishable.
pub fn document_id_for(file_name: &str) -> String {
    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("document");
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{stem}_{}", &suffix[..8])
}

/// Produces raw text from a document. Text quality is not judged here; an
/// empty result is the normalizer's call to reject.
pub fn extract_text(document: &RawDocument) -> Result<String, PipelineError> {
    match document.format {
        DocumentFormat::PlainText => Ok(String::from_utf8_lossy(&document.content).into_owned()),
        DocumentFormat::Pdf => pdf_extract::extract_text_from_mem(&document.content)
            .map_err(|e| PipelineError::DocumentUnreadable(format!("PDF: {e}"))),
        DocumentFormat::Docx => extract_docx_text(&document.content),
    }
}

fn extract_docx_text(content: &[u8]) -> Result<String, PipelineError> {
    let docx = docx_rs::read_docx(content)
        .map_err(|e| PipelineError::DocumentUnreadable(format!("DOCX: {e}")))?;

    let mut text = String::new();
    for child in &docx.document.children {
        match child {
            docx_rs::DocumentChild::Paragraph(para) => {
                push_paragraph(&mut text, para);
                text.push('\n');
            }
            // Resumes lay out skills and dates in tables often enough to matter.
            docx_rs::DocumentChild::Table(tbl) => {
                for row in &tbl.rows {
                    let docx_rs::TableChild::TableRow(tr) = row;
                    let mut cells = Vec::new();
                    for cell in &tr.cells {
                        let docx_rs::TableRowChild::TableCell(tc) = cell;
                        let mut cell_text = String::new();
                        for content in &tc.children {
                            if let docx_rs::TableCellContent::Paragraph(para) = content {
                                push_paragraph(&mut cell_text, para);
                                cell_text.push(' ');
                            }
                        }
                        cells.push(cell_text.trim().to_string());
                    }
                    text.push_str(&cells.join(" | "));
                    text.push('\n');
                }
            }
            _ => {}
        }
    }
    Ok(text)
}

fn push_paragraph(out: &mut String, para: &docx_rs::Paragraph) {
    for child in &para.children {
        if let docx_rs::ParagraphChild::Run(run) = child {
            for run_child in &run.children {
                if let docx_rs::RunChild::Text(t) = run_child {
                    out.push_str(&t.text);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(DocumentFormat::from_file_name("cv.PDF").unwrap(), DocumentFormat::Pdf);
        assert_eq!(DocumentFormat::from_file_name("cv.docx").unwrap(), DocumentFormat::Docx);
        assert_eq!(
            DocumentFormat::from_file_name("notes.txt").unwrap(),
            DocumentFormat::PlainText
        );
    }

    #[test]
    fn test_legacy_doc_is_unsupported() {
        let err = DocumentFormat::from_file_name("cv.doc").unwrap_err();
        assert_eq!(err, PipelineError::UnsupportedFormat(".doc".to_string()));
    }

    #[test]
    fn test_missing_extension_is_unsupported() {
        let err = DocumentFormat::from_file_name("resume").unwrap_err();
        assert_eq!(err.code(), "UNSUPPORTED_FORMAT");
    }

    #[test]
    fn test_plain_text_round_trips() {
        let doc = RawDocument::plain_text("a", "Python developer");
        assert_eq!(extract_text(&doc).unwrap(), "Python developer");
    }

    #[test]
    fn test_invalid_utf8_is_decoded_lossily() {
        let doc = RawDocument::new("a", DocumentFormat::PlainText, vec![b'S', b'Q', b'L', 0xff]);
        let text = extract_text(&doc).unwrap();
        assert!(text.starts_with("SQL"));
    }

    #[test]
    fn test_garbage_pdf_is_unreadable() {
        let doc = RawDocument::new("a", DocumentFormat::Pdf, b"not a pdf".to_vec());
        let err = extract_text(&doc).unwrap_err();
        assert_eq!(err.code(), "DOCUMENT_UNREADABLE");
    }

    #[test]
    fn test_garbage_docx_is_unreadable() {
        let doc = RawDocument::new("a", DocumentFormat::Docx, b"not a zip".to_vec());
        assert!(matches!(
            extract_text(&doc),
            Err(PipelineError::DocumentUnreadable(_))
        ));
    }

    #[test]
    fn test_document_id_keeps_stem() {
        let id = document_id_for("jane_doe.pdf");
        assert!(id.starts_with("jane_doe_"));
        assert_eq!(id.len(), "jane_doe_".len() + 8);
    }
}
