use anyhow::{Context, Result};
use bookshelf_lib::library::DocumentRepository;

use crate::app::App;
use crate::OutputFormat;

pub async fn run(app: &App, format: &OutputFormat) -> Result<()> {
    let previous = app.storage.load_folder_reference()?;
    app.manager
        .disconnect()
        .await
        .context("Failed to disconnect")?;

    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::json!({ "disconnected": previous.map(|r| r.path) })
        ),
        OutputFormat::Plain => match previous {
            Some(reference) => println!("Disconnected from {}", reference.path.display()),
            None => println!("No sync folder was connected"),
        },
    }
    Ok(())
}
