use anyhow::{Context, Result};

use crate::app::App;
use crate::render::terminal::{render_document_row, render_sync_result};
use crate::OutputFormat;

pub async fn run(
    app: &App,
    query: &str,
    position: usize,
    sync: bool,
    format: &OutputFormat,
    use_color: bool,
) -> Result<()> {
    let doc = app.find_document(query)?;
    let doc = app
        .manager
        .record_progress(doc.id, position.saturating_sub(1))
        .await
        .context("Failed to record progress")?;

    let result = if sync {
        Some(app.sync_session().await?)
    } else {
        None
    };

    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "id": doc.id.to_string(),
                "currentPageIndex": doc.current_page_index,
                "lastReadAt": doc.last_read_at.timestamp_millis(),
                "sync": result,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Plain => {
            println!("{}", render_document_row(&doc, use_color));
            if let Some(result) = result {
                println!("{}", render_sync_result(&result, use_color));
            }
        }
    }
    Ok(())
}
