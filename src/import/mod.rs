//! Format importers
//!
//! Turn the raw bytes of a supported file into a normalized `Document`.

mod epub;
mod html_text;
mod pdf;
mod text;

use thiserror::Error;

use crate::library::{Document, DocumentFormat};

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Unsupported file type: {0}")]
    Unsupported(String),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Malformed document: {0}")]
    Malformed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ImportError>;

/// Parses a file into a `Document`
pub trait DocumentImporter: Send + Sync {
    fn import_file(&self, file_name: &str, bytes: &[u8]) -> Result<Document>;
}

/// Importer for every built-in format, chosen by file extension
#[derive(Debug, Default, Clone)]
pub struct FormatImporter;

impl FormatImporter {
    pub fn new() -> Self {
        Self
    }
}

impl DocumentImporter for FormatImporter {
    fn import_file(&self, file_name: &str, bytes: &[u8]) -> Result<Document> {
        let format = DocumentFormat::from_file_name(file_name)
            .ok_or_else(|| ImportError::Unsupported(file_name.to_string()))?;

        log::debug!("Importing '{}' ({} bytes) as {:?}", file_name, bytes.len(), format);

        match format {
            DocumentFormat::Text => Ok(text::import_text(file_name, bytes)),
            DocumentFormat::Epub => epub::import_epub(file_name, bytes),
            DocumentFormat::Pdf => pdf::import_pdf(file_name, bytes),
        }
    }
}

/// File name without directory components or extension
pub(crate) fn file_stem(file_name: &str) -> String {
    let base = file_name.rsplit('/').next().unwrap_or(file_name);
    let stem = match base.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => base,
    };
    stem.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_extension() {
        let importer = FormatImporter::new();
        let err = importer.import_file("notes.docx", b"hello").unwrap_err();
        assert!(matches!(err, ImportError::Unsupported(_)));
    }

    #[test]
    fn test_identifier_stable_across_imports() {
        let importer = FormatImporter::new();
        let bytes = b"Chapter 1\nIt was a dark and stormy night.";
        let first = importer.import_file("storm.txt", bytes).unwrap();
        let second = importer.import_file("storm.txt", bytes).unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.id, Document::derive_id("storm.txt", bytes.len() as u64));
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem("books/war-and-peace.txt"), "war-and-peace");
        assert_eq!(file_stem("archive.tar.pdf"), "archive.tar");
        assert_eq!(file_stem(".hidden"), ".hidden");
    }
}
