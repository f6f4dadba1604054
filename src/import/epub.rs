//! EPUB import
//!
//! Follows `META-INF/container.xml` to the OPF package, reads Dublin Core
//! metadata, and flattens the spine into chapters of plain text.

use std::collections::HashMap;
use std::io::{Cursor, Read};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use zip::ZipArchive;

use super::html_text::{extract_heading, html_to_text};
use super::{file_stem, ImportError, Result};
use crate::library::{Chapter, Document, DocumentFormat};

const CONTAINER_PATH: &str = "META-INF/container.xml";

/// A manifest entry from the OPF package
#[derive(Debug, Clone)]
struct ManifestItem {
    href: String,
    media_type: String,
    properties: String,
}

/// Everything we need from the OPF package document
#[derive(Debug, Default)]
struct Package {
    title: Option<String>,
    creator: Option<String>,
    publisher: Option<String>,
    manifest: HashMap<String, ManifestItem>,
    spine: Vec<String>,
    cover_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum MetaField {
    Title,
    Creator,
    Publisher,
}

pub fn import_epub(file_name: &str, bytes: &[u8]) -> Result<Document> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;

    let container = read_entry_string(&mut archive, CONTAINER_PATH)?;
    let opf_path = find_rootfile(&container)?
        .ok_or_else(|| ImportError::Malformed("container.xml has no rootfile".to_string()))?;
    let opf = read_entry_string(&mut archive, &opf_path)?;
    let package = parse_package(&opf)?;
    let base_dir = opf_path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");

    let mut doc = Document::new(
        package.title.clone().unwrap_or_else(|| file_stem(file_name)),
        DocumentFormat::Epub,
        file_name,
        bytes.len() as u64,
    );
    doc.author = package.creator.clone();
    doc.publisher = package.publisher.clone();

    let mut content = String::new();
    let mut chapters = Vec::new();

    for idref in &package.spine {
        let Some(item) = package.manifest.get(idref) else {
            log::debug!("EPUB '{}': spine references unknown item '{}'", file_name, idref);
            continue;
        };
        if !item.media_type.contains("html") {
            continue;
        }

        let path = resolve_href(base_dir, &item.href);
        let html = match read_entry_string(&mut archive, &path) {
            Ok(html) => html,
            Err(e) => {
                log::warn!("EPUB '{}': skipping unreadable chapter '{}': {}", file_name, path, e);
                continue;
            }
        };

        let text = html_to_text(&html);
        if text.is_empty() {
            continue;
        }

        if !content.is_empty() {
            content.push_str("\n\n");
        }
        let start = content.len();
        content.push_str(&text);
        chapters.push(Chapter {
            title: extract_heading(&html).unwrap_or_else(|| format!("Chapter {}", chapters.len() + 1)),
            start,
            end: content.len(),
            page: None,
        });
    }

    if chapters.is_empty() {
        return Err(ImportError::Malformed(format!(
            "'{}' has no readable chapters",
            file_name
        )));
    }

    doc.content = content;
    doc.chapters = chapters;
    doc.cover = read_cover(&mut archive, &package, base_dir);

    log::info!(
        "Imported EPUB '{}' with {} chapters",
        doc.title,
        doc.chapters.len()
    );
    Ok(doc)
}

fn read_entry_string(archive: &mut ZipArchive<Cursor<&[u8]>>, name: &str) -> Result<String> {
    let mut entry = archive.by_name(name)?;
    let mut bytes = Vec::new();
    entry.read_to_end(&mut bytes)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn read_cover(
    archive: &mut ZipArchive<Cursor<&[u8]>>,
    package: &Package,
    base_dir: &str,
) -> Option<String> {
    let item = package
        .manifest
        .values()
        .find(|item| item.properties.split_whitespace().any(|p| p == "cover-image"))
        .or_else(|| {
            package
                .cover_id
                .as_ref()
                .and_then(|id| package.manifest.get(id))
        })?;

    if !item.media_type.starts_with("image/") {
        return None;
    }

    let mut entry = archive.by_name(&resolve_href(base_dir, &item.href)).ok()?;
    let mut bytes = Vec::new();
    entry.read_to_end(&mut bytes).ok()?;
    Some(format!("data:{};base64,{}", item.media_type, BASE64.encode(bytes)))
}

/// Attribute value by local name (namespace prefixes ignored)
fn attribute(e: &BytesStart, name: &[u8]) -> Result<Option<String>> {
    for attr in e.attributes().flatten() {
        if attr.key.local_name().as_ref() == name {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

fn find_rootfile(container: &str) -> Result<Option<String>> {
    let mut reader = Reader::from_str(container);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) | Event::Empty(ref e) if e.local_name().as_ref() == b"rootfile" => {
                if let Some(path) = attribute(e, b"full-path")? {
                    return Ok(Some(path));
                }
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
        buf.clear();
    }
}

fn parse_package(opf: &str) -> Result<Package> {
    let mut reader = Reader::from_str(opf);
    reader.config_mut().trim_text(true);

    let mut package = Package::default();
    let mut current: Option<MetaField> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) => {
                current = match e.local_name().as_ref() {
                    b"title" => Some(MetaField::Title),
                    b"creator" => Some(MetaField::Creator),
                    b"publisher" => Some(MetaField::Publisher),
                    _ => {
                        read_package_element(e, &mut package)?;
                        None
                    }
                };
            }
            Event::Empty(ref e) => read_package_element(e, &mut package)?,
            Event::Text(ref e) => {
                if let Some(field) = current {
                    let text = e.unescape()?.trim().to_string();
                    let slot = match field {
                        MetaField::Title => &mut package.title,
                        MetaField::Creator => &mut package.creator,
                        MetaField::Publisher => &mut package.publisher,
                    };
                    // First occurrence wins
                    if slot.is_none() && !text.is_empty() {
                        *slot = Some(text);
                    }
                }
            }
            Event::End(_) => current = None,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if package.spine.is_empty() {
        return Err(ImportError::Malformed("package has an empty spine".to_string()));
    }
    Ok(package)
}

fn read_package_element(e: &BytesStart, package: &mut Package) -> Result<()> {
    match e.local_name().as_ref() {
        b"item" => {
            if let (Some(id), Some(href)) = (attribute(e, b"id")?, attribute(e, b"href")?) {
                package.manifest.insert(
                    id,
                    ManifestItem {
                        href,
                        media_type: attribute(e, b"media-type")?.unwrap_or_default(),
                        properties: attribute(e, b"properties")?.unwrap_or_default(),
                    },
                );
            }
        }
        b"itemref" => {
            if let Some(idref) = attribute(e, b"idref")? {
                package.spine.push(idref);
            }
        }
        b"meta" => {
            if attribute(e, b"name")?.as_deref() == Some("cover") {
                package.cover_id = attribute(e, b"content")?;
            }
        }
        _ => {}
    }
    Ok(())
}

/// Resolve a manifest href against the OPF directory, collapsing `.` and `..`
fn resolve_href(base_dir: &str, href: &str) -> String {
    let href = href.split('#').next().unwrap_or(href);
    let decoded = urlencoding::decode(href)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| href.to_string());

    let mut parts: Vec<&str> = base_dir.split('/').filter(|s| !s.is_empty()).collect();
    for segment in decoded.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            s => parts.push(s),
        }
    }
    parts.join("/")
}
