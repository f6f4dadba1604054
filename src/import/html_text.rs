//! XHTML to plain-text reduction for EPUB chapters.

use std::sync::OnceLock;

use regex::Regex;

struct Patterns {
    dropped: Regex,
    comment: Regex,
    block: Regex,
    tag: Regex,
    spaces: Regex,
    blank_lines: Regex,
    title: Regex,
    heading: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        dropped: Regex::new(r"(?is)<(script|style|head)[^>]*>.*?</(script|style|head)>")
            .expect("valid pattern"),
        comment: Regex::new(r"(?s)<!--.*?-->").expect("valid pattern"),
        block: Regex::new(
            r"(?i)</?(div|p|br|h[1-6]|li|tr|blockquote|section|article|header|footer|aside|figure|figcaption)[^>]*>",
        )
        .expect("valid pattern"),
        tag: Regex::new(r"<[^>]+>").expect("valid pattern"),
        spaces: Regex::new(r"[ \t\u{a0}]+").expect("valid pattern"),
        blank_lines: Regex::new(r"\n\s*\n+").expect("valid pattern"),
        title: Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("valid pattern"),
        heading: Regex::new(r"(?is)<h[1-3][^>]*>(.*?)</h[1-3]>").expect("valid pattern"),
    })
}

/// Reduce an XHTML document to readable plain text.
///
/// Drops `<head>`, `<script>` and `<style>`, turns block elements into line
/// breaks, strips remaining tags, decodes entities and normalizes whitespace.
pub fn html_to_text(html: &str) -> String {
    let p = patterns();
    let text = p.dropped.replace_all(html, "");
    let text = p.comment.replace_all(&text, "");
    let text = p.block.replace_all(&text, "\n");
    let text = p.tag.replace_all(&text, "");
    let text = html_escape::decode_html_entities(&text);
    let text = p.spaces.replace_all(&text, " ");
    let text = p.blank_lines.replace_all(&text, "\n\n");

    text.lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Best chapter title: the first `h1`-`h3`, falling back to `<title>`
pub fn extract_heading(html: &str) -> Option<String> {
    let p = patterns();
    let raw = p
        .heading
        .captures(html)
        .or_else(|| p.title.captures(html))
        .map(|caps| caps[1].to_string())?;

    let clean = p.tag.replace_all(&raw, "");
    let clean = html_escape::decode_html_entities(&clean);
    let clean = p.spaces.replace_all(clean.trim(), " ").to_string();
    if clean.is_empty() {
        None
    } else {
        Some(clean)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_to_text_basic() {
        let html = "<html><head><title>T</title></head><body><h1>Hello</h1><p>This is a test.</p></body></html>";
        let text = html_to_text(html);
        assert_eq!(text, "Hello\n\nThis is a test.");
    }

    #[test]
    fn test_html_to_text_strips_styles_and_scripts() {
        let html = "<p>Before</p><style>p { color: red; }</style><script>x()</script><p>After</p>";
        let text = html_to_text(html);
        assert!(text.contains("Before"));
        assert!(text.contains("After"));
        assert!(!text.contains("color"));
        assert!(!text.contains("x()"));
    }

    #[test]
    fn test_html_to_text_decodes_entities() {
        let text = html_to_text("<p>Tom &amp; Jerry &#8212; &lt;3</p>");
        assert_eq!(text, "Tom & Jerry \u{2014} <3");
    }

    #[test]
    fn test_extract_heading_prefers_h_tags() {
        let html = "<title>Book</title><body><h2 class=\"c\">Chapter <em>One</em></h2></body>";
        assert_eq!(extract_heading(html), Some("Chapter One".to_string()));
    }

    #[test]
    fn test_extract_heading_falls_back_to_title() {
        assert_eq!(
            extract_heading("<title>Foo &amp; Bar</title><p>x</p>"),
            Some("Foo & Bar".to_string())
        );
        assert_eq!(extract_heading("<p>nothing</p>"), None);
    }
}
