//! Library data models
//!
//! A `Document` is one imported book. Its identifier is derived from the
//! original file name and byte size so the same file maps to the same
//! document on every device.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Namespace for content-derived document identifiers
const DOCUMENT_ID_NAMESPACE: Uuid = Uuid::from_u128(0x6b1d_5c0e_93a4_4f57_b2d8_0e4c_71f3_a9d2);

/// Current time truncated to whole milliseconds, matching the precision of
/// every persisted timestamp.
pub fn now_millis() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Supported document formats
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Text,
    Epub,
    Pdf,
}

impl DocumentFormat {
    /// Detect the format from a file name's extension (case-insensitive)
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let (_, ext) = file_name.rsplit_once('.')?;
        match ext.to_ascii_lowercase().as_str() {
            "txt" => Some(Self::Text),
            "epub" => Some(Self::Epub),
            "pdf" => Some(Self::Pdf),
            _ => None,
        }
    }

    /// Whether reading position is tracked per page rather than per chapter
    pub fn is_paginated(&self) -> bool {
        matches!(self, Self::Pdf)
    }
}

/// A chapter is a titled span of the document's text
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Chapter {
    pub title: String,
    /// Byte offset of the chapter start within `Document::content`
    pub start: usize,
    /// Byte offset one past the chapter end
    pub end: usize,
    /// Source page number for paginated formats (1-based)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
}

/// An imported book
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: Uuid,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    pub format: DocumentFormat,
    /// Full plain-text content
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub chapters: Vec<Chapter>,
    /// Reading position: chapter index, or page index for paginated formats
    #[serde(default)]
    pub current_page_index: usize,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_read_at: DateTime<Utc>,
    /// Cover image as a data URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover: Option<String>,
    /// Raw bytes for page-image-rendered formats
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "base64_bytes"
    )]
    pub payload: Option<Vec<u8>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_count: Option<u32>,
    /// File name the document was imported from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_file_name: Option<String>,
}

impl Document {
    /// Create an unread document with an identifier derived from its source file
    pub fn new(title: String, format: DocumentFormat, file_name: &str, size: u64) -> Self {
        let now = now_millis();
        Self {
            id: Self::derive_id(file_name, size),
            title,
            author: None,
            publisher: None,
            format,
            content: String::new(),
            chapters: Vec::new(),
            current_page_index: 0,
            created_at: now,
            last_read_at: now,
            cover: None,
            payload: None,
            page_count: None,
            original_file_name: Some(file_name.to_string()),
        }
    }

    /// Deterministic identifier for a file, independent of device and run
    pub fn derive_id(file_name: &str, size: u64) -> Uuid {
        Uuid::new_v5(
            &DOCUMENT_ID_NAMESPACE,
            format!("{}:{}", file_name, size).as_bytes(),
        )
    }

    /// Number of addressable reading units (pages or chapters), at least 1
    pub fn total_units(&self) -> usize {
        let units = match (self.format.is_paginated(), self.page_count) {
            (true, Some(pages)) => pages as usize,
            _ => self.chapters.len(),
        };
        units.max(1)
    }

    /// Clamp a reading position into `[0, total_units - 1]`
    pub fn clamp_index(&self, index: usize) -> usize {
        index.min(self.total_units() - 1)
    }

    /// Move the reading position without touching `last_read_at`
    pub fn set_position(&mut self, index: usize) {
        self.current_page_index = self.clamp_index(index);
    }

    /// Record that the user read up to `index` at `at`
    pub fn record_progress(&mut self, index: usize, at: DateTime<Utc>) {
        self.set_position(index);
        self.last_read_at = at;
    }

    /// Metadata-only snapshot of the reading position
    pub fn progress(&self) -> ProgressEntry {
        ProgressEntry {
            page_index: self.current_page_index,
            last_read_at: self.last_read_at,
        }
    }

    /// Text of a single chapter, if the span is valid
    #[cfg(test)]
    pub fn chapter_text(&self, index: usize) -> Option<&str> {
        let chapter = self.chapters.get(index)?;
        self.content.get(chapter.start..chapter.end)
    }
}

/// Per-document reading progress, as exchanged through the sync folder
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEntry {
    pub page_index: usize,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_read_at: DateTime<Utc>,
}

/// Colour theme for the reader
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
    Sepia,
}

/// How pages are presented
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReadingMode {
    #[default]
    Paginated,
    Scroll,
}

/// User reading preferences
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ReaderSettings {
    pub theme: Theme,
    pub font_family: String,
    pub font_size: u32,
    pub line_height: f32,
    pub reading_mode: ReadingMode,
    pub focus_mode: bool,
    /// Fields written by other app versions, kept so they survive a round trip
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Default for ReaderSettings {
    fn default() -> Self {
        Self {
            theme: Theme::Light,
            font_family: "serif".to_string(),
            font_size: 18,
            line_height: 1.6,
            reading_mode: ReadingMode::Paginated,
            focus_mode: false,
            extra: serde_json::Map::new(),
        }
    }
}

/// Settings together with the time they last changed on this device
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SettingsRecord {
    pub settings: ReaderSettings,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "chrono::serde::ts_milliseconds_option"
    )]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Persisted pointer to the connected sync folder.
///
/// Deliberately carries no permission state: access must be re-verified
/// every session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FolderReference {
    pub path: PathBuf,
    pub name: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub connected_at: DateTime<Utc>,
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(b) => serializer.serialize_str(&BASE64.encode(b)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error> {
        let encoded: Option<String> = Option::deserialize(deserializer)?;
        encoded
            .map(|s| BASE64.decode(s).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_document(chapters: usize) -> Document {
        let mut doc = Document::new("Book".to_string(), DocumentFormat::Text, "book.txt", 42);
        for i in 0..chapters {
            doc.chapters.push(Chapter {
                title: format!("Chapter {}", i + 1),
                start: 0,
                end: 0,
                page: None,
            });
        }
        doc
    }

    #[test]
    fn test_derive_id_is_deterministic() {
        let a = Document::derive_id("moby-dick.epub", 1_024_000);
        let b = Document::derive_id("moby-dick.epub", 1_024_000);
        assert_eq!(a, b);

        assert_ne!(a, Document::derive_id("moby-dick.epub", 1_024_001));
        assert_ne!(a, Document::derive_id("Moby-Dick.epub", 1_024_000));
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(DocumentFormat::from_file_name("a.TXT"), Some(DocumentFormat::Text));
        assert_eq!(DocumentFormat::from_file_name("dir.name/b.epub"), Some(DocumentFormat::Epub));
        assert_eq!(DocumentFormat::from_file_name("c.pdf"), Some(DocumentFormat::Pdf));
        assert_eq!(DocumentFormat::from_file_name("d.mobi"), None);
        assert_eq!(DocumentFormat::from_file_name("README"), None);
    }

    #[test]
    fn test_position_is_clamped() {
        let mut doc = text_document(3);
        doc.set_position(10);
        assert_eq!(doc.current_page_index, 2);

        // A document without chapters still has one unit
        let mut empty = text_document(0);
        empty.set_position(5);
        assert_eq!(empty.current_page_index, 0);
    }

    #[test]
    fn test_paginated_units_use_page_count() {
        let mut doc = Document::new("Scan".to_string(), DocumentFormat::Pdf, "scan.pdf", 9);
        doc.page_count = Some(120);
        assert_eq!(doc.total_units(), 120);
        doc.set_position(500);
        assert_eq!(doc.current_page_index, 119);
    }

    #[test]
    fn test_timestamps_serialize_as_millis() {
        let doc = text_document(1);
        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(
            value["lastReadAt"].as_i64(),
            Some(doc.last_read_at.timestamp_millis())
        );
        assert_eq!(value["currentPageIndex"].as_u64(), Some(0));
    }

    #[test]
    fn test_payload_round_trips_through_base64() {
        let mut doc = text_document(1);
        doc.payload = Some(vec![0, 1, 2, 255]);
        let json = serde_json::to_string(&doc).unwrap();
        assert!(json.contains("AAEC/w=="));
        let back: Document = serde_json::from_str(&json).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn test_settings_keep_unknown_fields() {
        let json = r#"{"theme":"dark","fontSize":22,"hyphenation":true}"#;
        let settings: ReaderSettings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.theme, Theme::Dark);
        assert_eq!(settings.font_size, 22);
        assert_eq!(settings.font_family, "serif");
        assert_eq!(settings.extra.get("hyphenation"), Some(&serde_json::Value::Bool(true)));

        let out = serde_json::to_value(&settings).unwrap();
        assert_eq!(out["hyphenation"], serde_json::Value::Bool(true));
    }
}
