//! Core data models used throughout docqa.
//!
//! These types represent the documents, text units, passages and answers that
//! flow through the extraction, indexing and answering pipeline.

use serde::Serialize;

use crate::error::DocQaError;

/// Kind of source artifact, resolved from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Pdf,
    Docx,
    Pptx,
    Xlsx,
    Txt,
    WebPage,
}

impl FileKind {
    /// Resolve the kind from a file name or path (case-insensitive extension).
    ///
    /// ```rust
    /// use docqa::models::FileKind;
    ///
    /// assert_eq!(FileKind::from_name("Report.PDF").unwrap(), FileKind::Pdf);
    /// assert!(FileKind::from_name("data.csv").is_err());
    /// ```
    pub fn from_name(name: &str) -> Result<FileKind, DocQaError> {
        let ext = name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "pdf" => Ok(FileKind::Pdf),
            "docx" => Ok(FileKind::Docx),
            "pptx" => Ok(FileKind::Pptx),
            "xlsx" => Ok(FileKind::Xlsx),
            "txt" => Ok(FileKind::Txt),
            "html" | "htm" => Ok(FileKind::WebPage),
            _ => Err(DocQaError::UnsupportedFormat(ext)),
        }
    }
}

impl std::fmt::Display for FileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            FileKind::Pdf => "PDF",
            FileKind::Docx => "DOCX",
            FileKind::Pptx => "PPTX",
            FileKind::Xlsx => "XLSX",
            FileKind::Txt => "TXT",
            FileKind::WebPage => "web page",
        };
        f.write_str(label)
    }
}

/// One semantically coherent piece of a document: a page, slide, run, sheet
/// or whole-file block.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextUnit {
    /// Normalized text (see [`crate::extract::normalize_text`]).
    pub content: String,
    /// 1-based page, slide or sheet number. `None` for single-unit documents.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_index: Option<u32>,
}

impl TextUnit {
    pub fn new(content: String, unit_index: Option<u32>) -> Self {
        Self {
            content,
            unit_index,
        }
    }
}

/// A token-bounded slice of a document's text, the unit of retrieval and
/// prompt inclusion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Passage {
    pub text: String,
    /// `<document-name>-<ordinal>`, unique within a document.
    pub source_id: String,
    /// Identifier of the owning [`Document`].
    pub document_id: String,
    /// Unit (page/slide/sheet) in which the passage begins.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_index: Option<u32>,
    /// Token count at chunk time. Not carried through the vector index.
    #[serde(skip)]
    pub token_length: usize,
}

/// One uploaded file or crawled page.
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    /// SHA-256 of the raw bytes, or a UUID for crawled pages.
    pub identifier: String,
    /// File name or URL.
    pub name: String,
    pub kind: FileKind,
    pub units: Vec<TextUnit>,
    /// Populated by [`crate::chunk::chunk`]; empty until then.
    pub passages: Vec<Passage>,
}

impl Document {
    pub fn new(identifier: String, name: String, kind: FileKind, units: Vec<TextUnit>) -> Self {
        Self {
            identifier,
            name,
            kind,
            units,
            passages: Vec::new(),
        }
    }
}

/// The result of a query: resolved answer text plus supporting passages.
#[derive(Debug, Clone, Serialize)]
pub struct AnswerWithSources {
    pub answer: String,
    pub sources: Vec<Passage>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_from_name_is_case_insensitive() {
        assert_eq!(FileKind::from_name("a.DocX").unwrap(), FileKind::Docx);
        assert_eq!(FileKind::from_name("dir/b.pptx").unwrap(), FileKind::Pptx);
        assert_eq!(FileKind::from_name("c.xlsx").unwrap(), FileKind::Xlsx);
        assert_eq!(FileKind::from_name("notes.txt").unwrap(), FileKind::Txt);
        assert_eq!(FileKind::from_name("index.htm").unwrap(), FileKind::WebPage);
    }

    #[test]
    fn unknown_extension_is_reported() {
        let err = FileKind::from_name("archive.tar.gz").unwrap_err();
        assert_eq!(err, DocQaError::UnsupportedFormat("gz".to_string()));
        let err = FileKind::from_name("README").unwrap_err();
        assert_eq!(err, DocQaError::UnsupportedFormat(String::new()));
    }
}
