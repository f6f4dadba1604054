use anyhow::Result;

use crate::app::App;
use crate::render::terminal::render_sync_result;
use crate::OutputFormat;

pub async fn run(app: &App, format: &OutputFormat, use_color: bool) -> Result<()> {
    let result = app.sync_session().await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Plain => println!("{}", render_sync_result(&result, use_color)),
    }
    Ok(())
}
