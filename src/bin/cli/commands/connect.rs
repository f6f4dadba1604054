use std::path::Path;

use anyhow::{Context, Result};

use crate::app::App;
use crate::render::terminal::render_sync_result;
use crate::OutputFormat;

pub async fn run(app: &App, path: &Path, format: &OutputFormat, use_color: bool) -> Result<()> {
    let folder = app.open_folder(path)?;
    let name = folder.name().to_string();

    let result = app
        .manager
        .connect_folder(folder)
        .await
        .with_context(|| format!("Failed to connect '{}'", name))?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Plain => {
            println!("Connected '{}'", name);
            println!("{}", render_sync_result(&result, use_color));
        }
    }
    Ok(())
}
