use anyhow::{Context, Result};
use bookshelf_lib::library::DocumentRepository;

use crate::app::App;
use crate::render::terminal::render_document_row;
use crate::OutputFormat;

pub fn run(app: &App, format: &OutputFormat, use_color: bool) -> Result<()> {
    let documents = app
        .storage
        .get_all()
        .context("Failed to list documents")?;

    match format {
        OutputFormat::Json => {
            let output: Vec<_> = documents
                .iter()
                .map(|doc| {
                    serde_json::json!({
                        "id": doc.id.to_string(),
                        "title": doc.title,
                        "author": doc.author,
                        "format": doc.format,
                        "currentPageIndex": doc.current_page_index,
                        "totalUnits": doc.total_units(),
                        "lastReadAt": doc.last_read_at.timestamp_millis(),
                        "originalFileName": doc.original_file_name,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Plain => {
            if documents.is_empty() {
                println!("(no documents)");
            }
            for doc in &documents {
                println!("{}", render_document_row(doc, use_color));
            }
        }
    }

    Ok(())
}
