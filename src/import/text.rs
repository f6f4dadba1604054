//! Plain-text import with heading-based chapter detection.

use std::sync::OnceLock;

use regex::Regex;

use super::file_stem;
use crate::library::{Chapter, Document, DocumentFormat};

/// Target section size when a text has no recognizable headings
const SECTION_TARGET_BYTES: usize = 12_000;

/// Headings longer than this are treated as prose
const MAX_HEADING_LEN: usize = 80;

fn heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)^(chapter|part|book)\s+([0-9]+|[ivxlcdm]+|one|two|three|four|five|six|seven|eight|nine|ten|eleven|twelve)\b.*$|^(prologue|epilogue|preface|introduction)\b.*$|^第[0-9零一二三四五六七八九十百千]+[章节回卷].*$",
        )
        .expect("heading pattern is valid")
    })
}

pub fn import_text(file_name: &str, bytes: &[u8]) -> Document {
    let mut content = String::from_utf8_lossy(bytes).into_owned();
    if content.starts_with('\u{feff}') {
        content.remove(0);
    }
    let content = content.replace("\r\n", "\n");

    let mut doc = Document::new(
        file_stem(file_name),
        DocumentFormat::Text,
        file_name,
        bytes.len() as u64,
    );

    let mut chapters = detect_headings(&content);
    if chapters.is_empty() {
        chapters = split_sections(&content);
    }
    doc.chapters = chapters;
    doc.content = content;
    doc
}

/// Chapters starting at each heading line; text before the first heading
/// becomes an untitled opening chapter when it has any substance.
fn detect_headings(content: &str) -> Vec<Chapter> {
    let mut starts: Vec<(usize, String)> = Vec::new();
    let mut offset = 0;
    for line in content.split_inclusive('\n') {
        let trimmed = line.trim();
        if !trimmed.is_empty() && trimmed.len() <= MAX_HEADING_LEN && heading_re().is_match(trimmed) {
            starts.push((offset, trimmed.to_string()));
        }
        offset += line.len();
    }

    if starts.is_empty() {
        return Vec::new();
    }

    let mut chapters = Vec::with_capacity(starts.len() + 1);
    if !content[..starts[0].0].trim().is_empty() {
        chapters.push(Chapter {
            title: "Opening".to_string(),
            start: 0,
            end: starts[0].0,
            page: None,
        });
    }
    for (i, (start, title)) in starts.iter().enumerate() {
        let end = starts.get(i + 1).map(|(s, _)| *s).unwrap_or(content.len());
        chapters.push(Chapter {
            title: title.clone(),
            start: *start,
            end,
            page: None,
        });
    }
    chapters
}

/// Fixed-size sections cut on paragraph boundaries
fn split_sections(content: &str) -> Vec<Chapter> {
    let mut chapters = Vec::new();
    let mut start = 0;

    while start < content.len() {
        let mut end = (start + SECTION_TARGET_BYTES).min(content.len());
        while !content.is_char_boundary(end) {
            end += 1;
        }
        if end < content.len() {
            if let Some(pos) = content[start..end].rfind("\n\n").filter(|pos| *pos > 0) {
                end = start + pos + 2;
            }
        }
        chapters.push(Chapter {
            title: format!("Section {}", chapters.len() + 1),
            start,
            end,
            page: None,
        });
        start = end;
    }

    if chapters.is_empty() {
        chapters.push(Chapter {
            title: "Section 1".to_string(),
            start: 0,
            end: 0,
            page: None,
        });
    }
    chapters
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_chapter_headings() {
        let text = "A Tale\nby Someone\n\nChapter 1\nFirst.\n\nChapter 2: Onward\nSecond.\n";
        let doc = import_text("tale.txt", text.as_bytes());

        assert_eq!(doc.title, "tale");
        assert_eq!(doc.chapters.len(), 3);
        assert_eq!(doc.chapters[0].title, "Opening");
        assert_eq!(doc.chapters[1].title, "Chapter 1");
        assert_eq!(doc.chapters[2].title, "Chapter 2: Onward");
        assert!(doc.chapter_text(1).unwrap().contains("First."));
        assert!(doc.chapter_text(2).unwrap().contains("Second."));
    }

    #[test]
    fn test_cjk_headings() {
        let text = "第一章 开始\n内容一\n第二章 结束\n内容二\n";
        let doc = import_text("book.txt", text.as_bytes());
        assert_eq!(doc.chapters.len(), 2);
        assert_eq!(doc.chapters[0].title, "第一章 开始");
    }

    #[test]
    fn test_splits_unstructured_text() {
        let paragraph = "word ".repeat(400);
        let text = vec![paragraph; 20].join("\n\n");
        let doc = import_text("long.txt", text.as_bytes());

        assert!(doc.chapters.len() > 1);
        assert_eq!(doc.chapters.first().unwrap().start, 0);
        assert_eq!(doc.chapters.last().unwrap().end, doc.content.len());
        for pair in doc.chapters.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
    }

    #[test]
    fn test_empty_text_has_one_unit() {
        let doc = import_text("empty.txt", b"");
        assert_eq!(doc.chapters.len(), 1);
        assert_eq!(doc.total_units(), 1);
    }

    #[test]
    fn test_strips_bom_and_crlf() {
        let doc = import_text("win.txt", "\u{feff}line one\r\nline two".as_bytes());
        assert_eq!(doc.content, "line one\nline two");
    }
}
