mod app;
mod commands;
mod render;
mod watcher;

use std::io::IsTerminal;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "bookshelf-cli", about = "Bookshelf library and folder sync", version)]
struct Cli {
    /// Config file (default: $BOOKSHELF_CONFIG or <config dir>/bookshelf/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, default_value = "plain")]
    format: OutputFormat,

    /// Disable ANSI colors
    #[arg(long, global = true)]
    no_color: bool,

    /// Grant folder access without asking
    #[arg(short = 'y', long, global = true)]
    yes: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Plain,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Connect a sync folder and run a first sync
    Connect {
        /// Folder shared between devices
        path: PathBuf,
    },

    /// Sync with the connected folder
    Sync,

    /// Show the sync connection and library state
    Status,

    /// Forget the connected folder (its files are kept)
    Disconnect,

    /// List documents with their reading position
    List,

    /// Import documents from a folder without connecting it
    Import {
        /// Folder to scan
        path: PathBuf,
    },

    /// Set the reading position of a document
    Progress {
        /// Document title or id (case-insensitive prefix match)
        document: String,
        /// Chapter or page number, starting at 1
        position: usize,
        /// Sync with the connected folder afterwards
        #[arg(long)]
        sync: bool,
    },

    /// Delete a document from the library
    Delete {
        /// Document title or id (case-insensitive prefix match)
        document: String,
        /// Also delete the document's file from the sync folder
        #[arg(long)]
        remove_file: bool,
    },

    /// Show or change reader settings
    #[command(subcommand)]
    Settings(SettingsCommand),

    /// Keep syncing in the background while the library changes
    Watch,
}

#[derive(Subcommand)]
enum SettingsCommand {
    /// Print the current settings
    Show,

    /// Change one setting, e.g. `set fontSize 20` or `set theme dark`
    Set {
        /// Setting name as stored (camelCase)
        key: String,
        /// JSON value; bare words are taken as strings
        value: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let use_color = !cli.no_color && std::io::stdout().is_terminal();
    let app = app::App::new(cli.config.as_deref(), cli.yes)?;

    match cli.command {
        Command::Connect { path } => {
            commands::connect::run(&app, &path, &cli.format, use_color).await?;
        }
        Command::Sync => {
            commands::sync::run(&app, &cli.format, use_color).await?;
        }
        Command::Status => {
            commands::status::run(&app, &cli.format, use_color).await?;
        }
        Command::Disconnect => {
            commands::disconnect::run(&app, &cli.format).await?;
        }
        Command::List => {
            commands::list::run(&app, &cli.format, use_color)?;
        }
        Command::Import { path } => {
            commands::import::run(&app, &path, &cli.format, use_color).await?;
        }
        Command::Progress {
            document,
            position,
            sync,
        } => {
            commands::progress::run(&app, &document, position, sync, &cli.format, use_color).await?;
        }
        Command::Delete {
            document,
            remove_file,
        } => {
            commands::delete::run(&app, &document, remove_file, &cli.format).await?;
        }
        Command::Settings(subcmd) => match subcmd {
            SettingsCommand::Show => {
                commands::settings::run_show(&app, &cli.format)?;
            }
            SettingsCommand::Set { key, value } => {
                commands::settings::run_set(&app, &key, &value, &cli.format).await?;
            }
        },
        Command::Watch => {
            commands::watch::run(&app, use_color).await?;
        }
    }

    Ok(())
}
