use anyhow::{Context, Result};
use bookshelf_lib::library::DocumentRepository;

use crate::app::App;
use crate::render::terminal::render_status;
use crate::OutputFormat;

pub async fn run(app: &App, format: &OutputFormat, use_color: bool) -> Result<()> {
    // Checks the remembered folder without prompting
    app.manager
        .restore_session()
        .await
        .context("Failed to restore sync folder")?;

    let status = app.manager.status();
    let reference = app.storage.load_folder_reference()?;
    let documents = app.storage.get_all()?.len();

    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "status": status,
                "path": reference.as_ref().map(|r| &r.path),
                "connectedAt": reference.as_ref().map(|r| r.connected_at.timestamp_millis()),
                "documents": documents,
                "dataDir": app.storage.base_path(),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Plain => {
            println!("{}", render_status(&status, use_color));
            if let Some(reference) = reference {
                println!("  Path: {}", reference.path.display());
            }
            println!("Library: {} documents in {}", documents, app.storage.base_path().display());
        }
    }
    Ok(())
}
