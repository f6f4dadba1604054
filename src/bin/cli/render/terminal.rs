use bookshelf_lib::library::Document;
use bookshelf_lib::sync::{ConnectionState, ImportFailure, SyncResult, SyncState, SyncStatus};
use chrono::{DateTime, Local, Utc};

/// ANSI color codes
pub struct Color;

impl Color {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const DIM: &str = "\x1b[2m";
    pub const RED: &str = "\x1b[31m";
    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const CYAN: &str = "\x1b[36m";
}

pub fn paint(text: &str, color: &str, use_color: bool) -> String {
    if use_color {
        format!("{}{}{}", color, text, Color::RESET)
    } else {
        text.to_string()
    }
}

pub fn format_time(time: DateTime<Utc>) -> String {
    time.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

/// One line per document: title, author, position and last read time
pub fn render_document_row(doc: &Document, use_color: bool) -> String {
    let position = format!("{}/{}", doc.current_page_index + 1, doc.total_units());
    let author = doc
        .author
        .as_deref()
        .map(|a| format!(" {}", paint(&format!("by {}", a), Color::DIM, use_color)))
        .unwrap_or_default();
    let id = paint(&doc.id.to_string()[..8], Color::DIM, use_color);

    format!(
        "{} {}{}  {}  {}",
        id,
        paint(&doc.title, Color::BOLD, use_color),
        author,
        paint(&position, Color::CYAN, use_color),
        format_time(doc.last_read_at)
    )
}

pub fn render_sync_result(result: &SyncResult, use_color: bool) -> String {
    let mut lines = vec![format!(
        "{} in {}ms",
        paint("Synced", Color::GREEN, use_color),
        result.duration_ms
    )];

    if !result.remote_found {
        lines.push("  No previous sync state in folder, created it".to_string());
    }
    lines.push(format!("  Imported: {}", result.imported));
    lines.push(format!("  Positions taken from folder: {}", result.progress_adopted));
    if result.settings_changed {
        lines.push("  Settings updated from folder".to_string());
    }
    lines.extend(render_failures(&result.import_failures, use_color));

    lines.join("\n")
}

pub fn render_failures(failures: &[ImportFailure], use_color: bool) -> Vec<String> {
    failures
        .iter()
        .map(|f| {
            format!(
                "  {} {}: {}",
                paint("skipped", Color::YELLOW, use_color),
                f.path,
                f.error
            )
        })
        .collect()
}

pub fn render_status(status: &SyncStatus, use_color: bool) -> String {
    let connection = match status.connection {
        ConnectionState::Disconnected => paint("not connected", Color::DIM, use_color),
        ConnectionState::Connected => paint("connected", Color::GREEN, use_color),
        ConnectionState::NeedsReconnect => {
            paint("needs permission (run `sync`)", Color::YELLOW, use_color)
        }
        ConnectionState::NeedsReselect => {
            paint("folder missing (run `connect`)", Color::RED, use_color)
        }
    };

    let mut lines = vec![format!("Folder: {}", connection)];
    if let Some(folder) = &status.folder {
        lines.push(format!("  Name: {}", folder));
    }
    let state = match status.state {
        SyncState::Idle => "idle",
        SyncState::Syncing => "syncing",
        SyncState::Success => "success",
        SyncState::Error => "error",
    };
    lines.push(format!("  State: {}", state));
    if let Some(last) = status.last_sync {
        lines.push(format!("  Last sync: {}", format_time(last)));
    }
    if let Some(error) = &status.error {
        lines.push(format!("  Error: {}", paint(error, Color::RED, use_color)));
    }
    lines.join("\n")
}
