use anyhow::{Context, Result};

use crate::app::App;
use crate::OutputFormat;

pub async fn run(app: &App, query: &str, remove_file: bool, format: &OutputFormat) -> Result<()> {
    let doc = app.find_document(query)?;

    if remove_file {
        app.require_session().await?;
    }

    let file_removed = app
        .manager
        .delete_document(doc.id, remove_file)
        .await
        .with_context(|| format!("Failed to delete '{}'", doc.title))?;

    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::json!({ "id": doc.id.to_string(), "fileRemoved": file_removed })
        ),
        OutputFormat::Plain => {
            println!("Deleted '{}'", doc.title);
            if file_removed {
                println!("  File removed from sync folder");
            } else if remove_file {
                println!("  No matching file found in sync folder");
            }
        }
    }
    Ok(())
}
