use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};

use bookshelf_lib::config::AppConfig;
use bookshelf_lib::import::FormatImporter;
use bookshelf_lib::library::{Document, DocumentRepository, LibraryStorage};
use bookshelf_lib::sync::{
    AlwaysGrant, ConnectionState, FolderHandle, LocalFolder, LocalFolderOpener, PermissionPrompt,
    SyncManager, SyncResult, TerminalPrompt,
};

/// Shared application state for CLI commands
pub struct App {
    pub config: AppConfig,
    pub storage: Arc<LibraryStorage>,
    pub manager: Arc<SyncManager>,
    prompt: Arc<dyn PermissionPrompt>,
}

impl App {
    /// Load config and open the library
    pub fn new(config_path: Option<&Path>, auto_grant: bool) -> Result<Self> {
        let config = match config_path {
            Some(path) => AppConfig::load(path),
            None => AppConfig::load_default(),
        }
        .context("Failed to load config")?;

        let data_dir = config.data_dir().context("Failed to get data directory")?;
        let storage = Arc::new(LibraryStorage::new(data_dir));
        storage
            .init()
            .context("Failed to initialize library storage")?;

        let prompt: Arc<dyn PermissionPrompt> = if auto_grant {
            Arc::new(AlwaysGrant)
        } else {
            Arc::new(TerminalPrompt)
        };

        let manager = Arc::new(SyncManager::new(
            storage.clone(),
            Arc::new(FormatImporter::new()),
            Arc::new(LocalFolderOpener::new(prompt.clone())),
            config.sync.clone(),
        ));

        Ok(Self {
            config,
            storage,
            manager,
            prompt,
        })
    }

    /// Handle for a folder given on the command line
    pub fn open_folder(&self, path: &Path) -> Result<Arc<dyn FolderHandle>> {
        let root = path
            .canonicalize()
            .with_context(|| format!("Folder not found: {}", path.display()))?;
        if !root.is_dir() {
            bail!("Not a folder: {}", root.display());
        }
        Ok(Arc::new(LocalFolder::open(root, self.prompt.clone())))
    }

    /// Reopen the remembered folder, failing if there is none to use
    pub async fn require_session(&self) -> Result<ConnectionState> {
        let state = self
            .manager
            .restore_session()
            .await
            .context("Failed to restore sync folder")?;

        match state {
            ConnectionState::Disconnected => {
                bail!("No sync folder connected. Run `bookshelf-cli connect <path>` first.")
            }
            ConnectionState::NeedsReselect => {
                let name = self
                    .storage
                    .load_folder_reference()?
                    .map(|r| r.path.display().to_string())
                    .unwrap_or_default();
                bail!(
                    "Sync folder {} is no longer available. Connect it again with `bookshelf-cli connect <path>`.",
                    name
                )
            }
            state => Ok(state),
        }
    }

    /// Sync the remembered folder, asking for access again when needed
    pub async fn sync_session(&self) -> Result<SyncResult> {
        let result = match self.require_session().await? {
            ConnectionState::Connected => self.manager.sync().await,
            _ => self.manager.reconnect().await,
        };
        result.context("Sync failed")
    }

    /// Find a document by id prefix or title (case-insensitive, exact then prefix)
    pub fn find_document(&self, query: &str) -> Result<Document> {
        let documents = self
            .storage
            .get_all()
            .context("Failed to list documents")?;

        let query_lower = query.to_lowercase();

        if let Some(doc) = documents
            .iter()
            .find(|d| d.title.to_lowercase() == query_lower || d.id.to_string() == query_lower)
        {
            return Ok(doc.clone());
        }

        let matches: Vec<&Document> = documents
            .iter()
            .filter(|d| {
                d.title.to_lowercase().starts_with(&query_lower)
                    || d.id.to_string().starts_with(&query_lower)
            })
            .collect();

        match matches.len() {
            0 => bail!("No document matching '{}'", query),
            1 => Ok(matches[0].clone()),
            _ => bail!(
                "Ambiguous document '{}'. Matches:\n{}",
                query,
                matches
                    .iter()
                    .map(|d| format!("  - {} ({})", d.title, &d.id.to_string()[..8]))
                    .collect::<Vec<_>>()
                    .join("\n")
            ),
        }
    }
}
