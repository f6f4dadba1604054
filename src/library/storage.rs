//! Library storage operations
//!
//! Documents are stored one JSON file each under `documents/`, alongside
//! `settings.json` and `folder.json` in the data directory.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use uuid::Uuid;

use super::models::{Document, FolderReference, SettingsRecord};

/// Error type for library operations
#[derive(Debug, thiserror::Error)]
pub enum LibraryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Document not found: {0}")]
    NotFound(Uuid),

    #[error("Data directory not found")]
    DataDirNotFound,
}

pub type Result<T> = std::result::Result<T, LibraryError>;

/// Local record store the sync engine reads from and commits to.
///
/// Implementations serialize their own reads and writes.
pub trait DocumentRepository: Send + Sync {
    fn get(&self, id: Uuid) -> Result<Option<Document>>;
    fn get_all(&self) -> Result<Vec<Document>>;
    fn put(&self, document: &Document) -> Result<()>;
    fn delete(&self, id: Uuid) -> Result<()>;

    fn save_folder_reference(&self, reference: &FolderReference) -> Result<()>;
    fn load_folder_reference(&self) -> Result<Option<FolderReference>>;
    fn clear_folder_reference(&self) -> Result<()>;

    fn load_settings(&self) -> Result<SettingsRecord>;
    fn save_settings(&self, settings: &SettingsRecord) -> Result<()>;
}

/// File-backed document repository
pub struct LibraryStorage {
    /// Base path for app data (e.g., ~/.local/share/bookshelf)
    base_path: PathBuf,
    write_lock: Mutex<()>,
}

impl LibraryStorage {
    /// Create a new library storage
    pub fn new(base_path: PathBuf) -> Self {
        Self {
            base_path,
            write_lock: Mutex::new(()),
        }
    }

    /// Get the default data directory
    pub fn default_data_dir() -> Result<PathBuf> {
        dirs::data_local_dir()
            .map(|p| p.join("bookshelf"))
            .ok_or(LibraryError::DataDirNotFound)
    }

    /// Initialize storage directories
    pub fn init(&self) -> Result<()> {
        fs::create_dir_all(self.documents_dir())?;
        Ok(())
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn documents_dir(&self) -> PathBuf {
        self.base_path.join("documents")
    }

    fn document_path(&self, id: Uuid) -> PathBuf {
        self.documents_dir().join(format!("{}.json", id))
    }

    fn settings_path(&self) -> PathBuf {
        self.base_path.join("settings.json")
    }

    fn folder_path(&self) -> PathBuf {
        self.base_path.join("folder.json")
    }

    /// Write through a temporary file so readers never see a half-written record
    fn write_atomic(&self, path: &Path, content: &str) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, content)?;
        fs::rename(&tmp_path, path)?;
        Ok(())
    }

    fn remove(&self, path: &Path) -> Result<bool> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        match fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

impl DocumentRepository for LibraryStorage {
    fn get(&self, id: Uuid) -> Result<Option<Document>> {
        let path = self.document_path(id);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    fn get_all(&self) -> Result<Vec<Document>> {
        let dir = self.documents_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut documents = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().map(|e| e == "json").unwrap_or(false) {
                let content = fs::read_to_string(&path)?;
                match serde_json::from_str::<Document>(&content) {
                    Ok(doc) => documents.push(doc),
                    Err(e) => log::warn!("Skipping unreadable document {:?}: {}", path, e),
                }
            }
        }

        // Most recently read first
        documents.sort_by(|a, b| b.last_read_at.cmp(&a.last_read_at));
        Ok(documents)
    }

    fn put(&self, document: &Document) -> Result<()> {
        let content = serde_json::to_string(document)?;
        self.write_atomic(&self.document_path(document.id), &content)
    }

    fn delete(&self, id: Uuid) -> Result<()> {
        if !self.remove(&self.document_path(id))? {
            return Err(LibraryError::NotFound(id));
        }
        log::info!("Deleted document {}", id);
        Ok(())
    }

    fn save_folder_reference(&self, reference: &FolderReference) -> Result<()> {
        let content = serde_json::to_string_pretty(reference)?;
        self.write_atomic(&self.folder_path(), &content)
    }

    fn load_folder_reference(&self) -> Result<Option<FolderReference>> {
        let path = self.folder_path();
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    fn clear_folder_reference(&self) -> Result<()> {
        self.remove(&self.folder_path())?;
        Ok(())
    }

    fn load_settings(&self) -> Result<SettingsRecord> {
        let path = self.settings_path();
        if !path.exists() {
            return Ok(SettingsRecord::default());
        }
        let content = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn save_settings(&self, settings: &SettingsRecord) -> Result<()> {
        let content = serde_json::to_string_pretty(settings)?;
        self.write_atomic(&self.settings_path(), &content)
    }
}
