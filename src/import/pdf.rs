//! PDF import
//!
//! PDFs are rendered page by page from their raw bytes, so import keeps the
//! bytes as the payload and only extracts what the library view needs: a
//! page count and, when present, the title from the info dictionary.

use std::sync::OnceLock;

use regex::bytes::Regex;

use super::{file_stem, ImportError, Result};
use crate::library::{Chapter, Document, DocumentFormat};

/// Largest page count accepted from a file's page tree
const MAX_PAGES: u32 = 100_000;

fn page_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/Type\s*/Page\b").expect("valid pattern"))
}

fn count_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"/Type\s*/Pages\b[^>]*?/Count\s+(\d+)|/Count\s+(\d+)[^>]*?/Type\s*/Pages\b")
            .expect("valid pattern")
    })
}

fn title_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/Title\s*\(((?:[^()\\]|\\.)*)\)").expect("valid pattern"))
}

pub fn import_pdf(file_name: &str, bytes: &[u8]) -> Result<Document> {
    if !bytes.starts_with(b"%PDF-") {
        return Err(ImportError::Malformed(format!(
            "'{}' is missing the PDF header",
            file_name
        )));
    }

    let pages = page_count(bytes).max(1);
    // Every page needs at least a few bytes of its own
    if pages > MAX_PAGES || pages as usize > bytes.len() {
        return Err(ImportError::Malformed(format!(
            "'{}' declares {} pages",
            file_name, pages
        )));
    }
    let title = pdf_title(bytes).unwrap_or_else(|| file_stem(file_name));

    let mut doc = Document::new(title, DocumentFormat::Pdf, file_name, bytes.len() as u64);
    doc.page_count = Some(pages);
    doc.chapters = (1..=pages)
        .map(|page| Chapter {
            title: format!("Page {}", page),
            start: 0,
            end: 0,
            page: Some(page),
        })
        .collect();
    doc.payload = Some(bytes.to_vec());

    log::info!("Imported PDF '{}' with {} pages", doc.title, pages);
    Ok(doc)
}

/// Page count from the page tree root, falling back to counting page objects
fn page_count(bytes: &[u8]) -> u32 {
    let from_tree = count_re()
        .captures_iter(bytes)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
        .filter_map(|m| std::str::from_utf8(m.as_bytes()).ok()?.parse::<u32>().ok())
        .max();

    from_tree.unwrap_or_else(|| page_re().find_iter(bytes).count() as u32)
}

/// Literal-string title from the document info dictionary
fn pdf_title(bytes: &[u8]) -> Option<String> {
    let caps = title_re().captures(bytes)?;
    let raw = caps.get(1)?.as_bytes();
    let title = String::from_utf8_lossy(raw)
        .replace("\\(", "(")
        .replace("\\)", ")")
        .replace("\\\\", "\\")
        .trim()
        .to_string();
    if title.is_empty() || title.chars().any(|c| c.is_control()) {
        None
    } else {
        Some(title)
    }
}
