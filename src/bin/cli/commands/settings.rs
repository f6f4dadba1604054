use anyhow::{bail, Context, Result};
use bookshelf_lib::library::{DocumentRepository, ReaderSettings};

use crate::app::App;
use crate::OutputFormat;

pub fn run_show(app: &App, format: &OutputFormat) -> Result<()> {
    let record = app.storage.load_settings()?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&record)?),
        OutputFormat::Plain => {
            let fields = serde_json::to_value(&record.settings)?;
            if let Some(fields) = fields.as_object() {
                for (key, value) in fields {
                    println!("{} = {}", key, value);
                }
            }
        }
    }
    Ok(())
}

pub async fn run_set(app: &App, key: &str, value: &str, format: &OutputFormat) -> Result<()> {
    let current = app.storage.load_settings()?.settings;

    // Accept JSON literals, fall back to a plain string
    let value: serde_json::Value = serde_json::from_str(value)
        .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));

    let mut fields = match serde_json::to_value(&current)? {
        serde_json::Value::Object(fields) => fields,
        _ => bail!("Settings are not an object"),
    };
    fields.insert(key.to_string(), value);

    let settings: ReaderSettings = serde_json::from_value(serde_json::Value::Object(fields))
        .with_context(|| format!("Invalid value for '{}'", key))?;
    let record = app
        .manager
        .update_settings(settings)
        .await
        .context("Failed to save settings")?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&record)?),
        OutputFormat::Plain => println!("Updated {}", key),
    }
    Ok(())
}
