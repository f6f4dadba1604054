use std::path::Path;

use anyhow::{Context, Result};

use crate::app::App;
use crate::render::terminal::render_failures;
use crate::OutputFormat;

pub async fn run(app: &App, path: &Path, format: &OutputFormat, use_color: bool) -> Result<()> {
    let folder = app.open_folder(path)?;
    let summary = app
        .manager
        .import_folder(folder.as_ref())
        .await
        .with_context(|| format!("Failed to import from {}", path.display()))?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
        OutputFormat::Plain => {
            println!(
                "Imported {} documents ({} already in library)",
                summary.imported, summary.already_present
            );
            for line in render_failures(&summary.import_failures, use_color) {
                println!("{}", line);
            }
            if summary.truncated {
                println!("Folder is too large or too deep; some files were not scanned");
            }
        }
    }
    Ok(())
}
