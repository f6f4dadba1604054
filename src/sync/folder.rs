//! Folder capability handle
//!
//! A `FolderHandle` is the only way the sync engine touches the user's
//! folder. Access is gated per handle: every operation checks the grant held
//! by the handle, and grants never outlive it, so a folder reopened in a new
//! session has to be authorized again.

use std::io::{self, BufRead, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use thiserror::Error;

use crate::library::FolderReference;

#[derive(Error, Debug)]
pub enum FolderError {
    #[error("Not found in sync folder: {0}")]
    NotFound(String),
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    #[error("Sync folder is unreachable: {0}")]
    Unreachable(PathBuf),
    #[error("Invalid folder path: {0}")]
    InvalidPath(String),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl FolderError {
    fn from_io(err: io::Error, path: &str) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => FolderError::NotFound(path.to_string()),
            io::ErrorKind::PermissionDenied => FolderError::PermissionDenied(path.to_string()),
            _ => FolderError::Io(err),
        }
    }
}

/// Access level requested from the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    Read,
    ReadWrite,
}

impl AccessMode {
    fn covers(self, requested: AccessMode) -> bool {
        self == AccessMode::ReadWrite || requested == AccessMode::Read
    }

    fn describe(self) -> &'static str {
        match self {
            AccessMode::Read => "read",
            AccessMode::ReadWrite => "read and write",
        }
    }
}

/// Grant state of a handle for one access mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionState {
    Granted,
    /// Not granted yet; asking the user may grant it
    Prompt,
    Denied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

/// One child of a listed directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderEntry {
    pub name: String,
    pub kind: EntryKind,
    /// Size in bytes (0 for directories)
    pub size: u64,
}

/// Capability reference to a user-chosen folder.
///
/// Paths are `/`-separated and relative to the folder root; the empty path
/// is the root itself.
#[async_trait]
pub trait FolderHandle: Send + Sync {
    /// Display name of the folder
    fn name(&self) -> &str;

    /// Location that reopens this folder in a later session
    fn reference(&self) -> PathBuf;

    /// Current grant for `mode`, without asking the user
    async fn query_permission(&self, mode: AccessMode) -> Result<PermissionState, FolderError>;

    /// Ask the user for `mode` access
    async fn request_permission(&self, mode: AccessMode) -> Result<PermissionState, FolderError>;

    async fn list(&self, path: &str) -> Result<Vec<FolderEntry>, FolderError>;

    async fn read_file(&self, path: &str) -> Result<Vec<u8>, FolderError>;

    /// Replace the file at `path` with `bytes` in one step
    async fn write_file(&self, path: &str, bytes: &[u8]) -> Result<(), FolderError>;

    async fn remove_file(&self, path: &str) -> Result<(), FolderError>;
}

/// Interactive permission dialog
pub trait PermissionPrompt: Send + Sync {
    /// Ask whether `folder` may be accessed in `mode`. Blocking.
    fn confirm(&self, folder: &str, mode: AccessMode) -> bool;
}

/// Asks on the terminal
pub struct TerminalPrompt;

impl PermissionPrompt for TerminalPrompt {
    fn confirm(&self, folder: &str, mode: AccessMode) -> bool {
        eprint!(
            "Allow bookshelf to {} the folder '{}'? [y/N] ",
            mode.describe(),
            folder
        );
        let _ = io::stderr().flush();

        let mut answer = String::new();
        if io::stdin().lock().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
    }
}

/// Grants every request without asking
pub struct AlwaysGrant;

impl PermissionPrompt for AlwaysGrant {
    fn confirm(&self, _folder: &str, _mode: AccessMode) -> bool {
        true
    }
}

/// Refuses every request
pub struct DenyAll;

impl PermissionPrompt for DenyAll {
    fn confirm(&self, _folder: &str, _mode: AccessMode) -> bool {
        false
    }
}

/// Opens handles for persisted folder references
pub trait FolderOpener: Send + Sync {
    fn open(&self, reference: &FolderReference) -> Arc<dyn FolderHandle>;
}

/// Opens `LocalFolder` handles that share one prompt
pub struct LocalFolderOpener {
    prompt: Arc<dyn PermissionPrompt>,
}

impl LocalFolderOpener {
    pub fn new(prompt: Arc<dyn PermissionPrompt>) -> Self {
        Self { prompt }
    }
}

impl FolderOpener for LocalFolderOpener {
    fn open(&self, reference: &FolderReference) -> Arc<dyn FolderHandle> {
        Arc::new(LocalFolder::open(reference.path.clone(), self.prompt.clone()))
    }
}

/// Folder on the local filesystem
pub struct LocalFolder {
    root: PathBuf,
    name: String,
    prompt: Arc<dyn PermissionPrompt>,
    /// Highest mode granted to this handle
    granted: Mutex<Option<AccessMode>>,
}

impl LocalFolder {
    /// Open a handle with no grant
    pub fn open(root: PathBuf, prompt: Arc<dyn PermissionPrompt>) -> Self {
        let name = root
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| root.display().to_string());
        Self {
            root,
            name,
            prompt,
            granted: Mutex::new(None),
        }
    }

    fn grant(&self) -> Option<AccessMode> {
        *self.granted.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_grant(&self, mode: AccessMode) {
        let mut granted = self.granted.lock().unwrap_or_else(|e| e.into_inner());
        if !granted.is_some_and(|g| g.covers(mode)) {
            *granted = Some(mode);
        }
    }

    fn require(&self, mode: AccessMode, path: &str) -> Result<(), FolderError> {
        match self.grant() {
            Some(g) if g.covers(mode) => Ok(()),
            _ => Err(FolderError::PermissionDenied(path.to_string())),
        }
    }

    async fn ensure_reachable(&self) -> Result<(), FolderError> {
        match tokio::fs::metadata(&self.root).await {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(FolderError::Unreachable(self.root.clone())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(FolderError::Unreachable(self.root.clone()))
            }
            Err(e) => Err(FolderError::from_io(e, "")),
        }
    }

    /// Map a relative folder path onto the filesystem, rejecting escapes
    fn resolve(&self, path: &str) -> Result<PathBuf, FolderError> {
        if path.starts_with('/') || path.contains('\\') {
            return Err(FolderError::InvalidPath(path.to_string()));
        }
        let relative = Path::new(path);
        for component in relative.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                _ => return Err(FolderError::InvalidPath(path.to_string())),
            }
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl FolderHandle for LocalFolder {
    fn name(&self) -> &str {
        &self.name
    }

    fn reference(&self) -> PathBuf {
        self.root.clone()
    }

    async fn query_permission(&self, mode: AccessMode) -> Result<PermissionState, FolderError> {
        self.ensure_reachable().await?;
        Ok(match self.grant() {
            Some(g) if g.covers(mode) => PermissionState::Granted,
            _ => PermissionState::Prompt,
        })
    }

    async fn request_permission(&self, mode: AccessMode) -> Result<PermissionState, FolderError> {
        self.ensure_reachable().await?;
        if self.grant().is_some_and(|g| g.covers(mode)) {
            return Ok(PermissionState::Granted);
        }

        let prompt = self.prompt.clone();
        let name = self.name.clone();
        let allowed = tokio::task::spawn_blocking(move || prompt.confirm(&name, mode))
            .await
            .unwrap_or(false);

        if allowed {
            self.set_grant(mode);
            log::info!("Granted {} access to '{}'", mode.describe(), self.name);
            Ok(PermissionState::Granted)
        } else {
            Ok(PermissionState::Denied)
        }
    }

    async fn list(&self, path: &str) -> Result<Vec<FolderEntry>, FolderError> {
        self.require(AccessMode::Read, path)?;
        let dir = self.resolve(path)?;
        let mut reader = tokio::fs::read_dir(&dir)
            .await
            .map_err(|e| FolderError::from_io(e, path))?;

        let mut entries = Vec::new();
        while let Some(entry) = reader
            .next_entry()
            .await
            .map_err(|e| FolderError::from_io(e, path))?
        {
            let name = entry.file_name().to_string_lossy().to_string();
            let meta = match tokio::fs::metadata(entry.path()).await {
                Ok(meta) => meta,
                Err(e) => {
                    log::debug!("Skipping unreadable entry '{}': {}", name, e);
                    continue;
                }
            };
            let (kind, size) = if meta.is_dir() {
                (EntryKind::Directory, 0)
            } else {
                (EntryKind::File, meta.len())
            };
            entries.push(FolderEntry { name, kind, size });
        }
        Ok(entries)
    }

    async fn read_file(&self, path: &str) -> Result<Vec<u8>, FolderError> {
        self.require(AccessMode::Read, path)?;
        let file = self.resolve(path)?;
        tokio::fs::read(&file)
            .await
            .map_err(|e| FolderError::from_io(e, path))
    }

    async fn write_file(&self, path: &str, bytes: &[u8]) -> Result<(), FolderError> {
        self.require(AccessMode::ReadWrite, path)?;
        let file = self.resolve(path)?;
        let file_name = file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| FolderError::InvalidPath(path.to_string()))?;

        if let Some(parent) = file.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| FolderError::from_io(e, path))?;
        }

        // Write to a hidden sibling and rename so readers never see a partial file
        let tmp = file.with_file_name(format!(".{}.tmp", file_name.trim_start_matches('.')));
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| FolderError::from_io(e, path))?;
        if let Err(e) = tokio::fs::rename(&tmp, &file).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(FolderError::from_io(e, path));
        }
        Ok(())
    }

    async fn remove_file(&self, path: &str) -> Result<(), FolderError> {
        self.require(AccessMode::ReadWrite, path)?;
        let file = self.resolve(path)?;
        tokio::fs::remove_file(&file)
            .await
            .map_err(|e| FolderError::from_io(e, path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn granted_folder() -> (LocalFolder, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let folder = LocalFolder::open(temp_dir.path().to_path_buf(), Arc::new(AlwaysGrant));
        (folder, temp_dir)
    }

    #[tokio::test]
    async fn test_fresh_handle_has_no_grant() {
        let (folder, _temp) = granted_folder();
        assert_eq!(
            folder.query_permission(AccessMode::Read).await.unwrap(),
            PermissionState::Prompt
        );
        assert!(matches!(
            folder.list("").await,
            Err(FolderError::PermissionDenied(_))
        ));
    }

    #[tokio::test]
    async fn test_read_write_grant_covers_read() {
        let (folder, _temp) = granted_folder();
        let state = folder.request_permission(AccessMode::ReadWrite).await.unwrap();
        assert_eq!(state, PermissionState::Granted);
        assert_eq!(
            folder.query_permission(AccessMode::Read).await.unwrap(),
            PermissionState::Granted
        );
    }

    #[tokio::test]
    async fn test_read_grant_does_not_allow_writes() {
        let (folder, _temp) = granted_folder();
        folder.request_permission(AccessMode::Read).await.unwrap();
        assert!(matches!(
            folder.write_file("a.txt", b"x").await,
            Err(FolderError::PermissionDenied(_))
        ));
    }

    #[tokio::test]
    async fn test_denied_request() {
        let temp_dir = TempDir::new().unwrap();
        let folder = LocalFolder::open(temp_dir.path().to_path_buf(), Arc::new(DenyAll));
        assert_eq!(
            folder.request_permission(AccessMode::ReadWrite).await.unwrap(),
            PermissionState::Denied
        );
    }

    #[tokio::test]
    async fn test_missing_root_is_unreachable() {
        let temp_dir = TempDir::new().unwrap();
        let folder = LocalFolder::open(temp_dir.path().join("gone"), Arc::new(AlwaysGrant));
        assert!(matches!(
            folder.query_permission(AccessMode::Read).await,
            Err(FolderError::Unreachable(_))
        ));
    }

    #[tokio::test]
    async fn test_write_read_list_remove() {
        let (folder, temp) = granted_folder();
        folder.request_permission(AccessMode::ReadWrite).await.unwrap();

        folder.write_file("books/one.txt", b"hello").await.unwrap();
        assert_eq!(folder.read_file("books/one.txt").await.unwrap(), b"hello");
        assert!(!temp.path().join("books/.one.txt.tmp").exists());

        let root = folder.list("").await.unwrap();
        assert_eq!(root.len(), 1);
        assert_eq!(root[0].kind, EntryKind::Directory);

        let books = folder.list("books").await.unwrap();
        assert_eq!(books[0].name, "one.txt");
        assert_eq!(books[0].size, 5);

        folder.remove_file("books/one.txt").await.unwrap();
        assert!(matches!(
            folder.read_file("books/one.txt").await,
            Err(FolderError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_paths_cannot_escape_root() {
        let (folder, _temp) = granted_folder();
        folder.request_permission(AccessMode::ReadWrite).await.unwrap();
        for path in ["../outside.txt", "/etc/passwd", "a/../../b", "a\\b"] {
            assert!(
                matches!(folder.read_file(path).await, Err(FolderError::InvalidPath(_))),
                "{} should be rejected",
                path
            );
        }
    }
}
