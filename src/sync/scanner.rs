//! Folder scanning
//!
//! Walks a folder for importable documents with an explicit worklist, bounded
//! in depth and entry count. Used by both plain folder import and sync.

use uuid::Uuid;

use super::config::SyncConfig;
use super::folder::{EntryKind, FolderError, FolderHandle};
use crate::library::{Document, DocumentFormat};

/// Traversal ceilings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanLimits {
    /// Deepest directory level descended into; the root is level 0
    pub max_depth: usize,
    /// Maximum directory entries examined
    pub max_entries: usize,
}

impl Default for ScanLimits {
    fn default() -> Self {
        Self::from(&SyncConfig::default())
    }
}

impl From<&SyncConfig> for ScanLimits {
    fn from(config: &SyncConfig) -> Self {
        Self {
            max_depth: config.max_scan_depth,
            max_entries: config.max_scan_entries,
        }
    }
}

/// A supported document found in the folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedFile {
    /// Path relative to the folder root
    pub path: String,
    /// File name without directories
    pub name: String,
    pub size: u64,
    pub format: DocumentFormat,
}

impl ScannedFile {
    /// Identifier the file will have once imported
    pub fn document_id(&self) -> Uuid {
        Document::derive_id(&self.name, self.size)
    }
}

/// An entry the scan could not descend into or read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEntry {
    pub path: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    pub files: Vec<ScannedFile>,
    pub skipped: Vec<SkippedEntry>,
    /// A limit was hit and part of the tree was not visited
    pub truncated: bool,
}

fn join(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", parent, name)
    }
}

/// Find every supported document under the folder root.
///
/// Only a failure to list the root itself is an error. Unreadable
/// subdirectories are recorded in `skipped` and the scan moves on.
pub async fn scan(folder: &dyn FolderHandle, limits: &ScanLimits) -> Result<ScanReport, FolderError> {
    let mut report = ScanReport::default();
    let mut visited = 0usize;
    let mut stack: Vec<(String, usize)> = vec![(String::new(), 0)];

    'walk: while let Some((dir, depth)) = stack.pop() {
        let entries = match folder.list(&dir).await {
            Ok(entries) => entries,
            Err(e) if dir.is_empty() => return Err(e),
            Err(e) => {
                log::warn!("Scan: skipping directory '{}': {}", dir, e);
                report.skipped.push(SkippedEntry {
                    path: dir,
                    reason: e.to_string(),
                });
                continue;
            }
        };

        for entry in entries {
            if entry.name.starts_with('.') {
                continue;
            }
            if visited >= limits.max_entries {
                log::warn!(
                    "Scan: stopped after {} entries in '{}'",
                    limits.max_entries,
                    folder.name()
                );
                report.truncated = true;
                break 'walk;
            }
            visited += 1;

            let path = join(&dir, &entry.name);
            match entry.kind {
                EntryKind::Directory if depth < limits.max_depth => {
                    stack.push((path, depth + 1));
                }
                EntryKind::Directory => {
                    log::debug!("Scan: depth limit reached at '{}'", path);
                    report.truncated = true;
                    report.skipped.push(SkippedEntry {
                        path,
                        reason: "depth limit reached".to_string(),
                    });
                }
                EntryKind::File => {
                    if let Some(format) = DocumentFormat::from_file_name(&entry.name) {
                        report.files.push(ScannedFile {
                            path,
                            name: entry.name,
                            size: entry.size,
                            format,
                        });
                    }
                }
            }
        }
    }

    report.files.sort_by(|a, b| a.path.cmp(&b.path));
    log::debug!(
        "Scan: {} documents found in '{}'",
        report.files.len(),
        folder.name()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::folder::{AccessMode, AlwaysGrant, LocalFolder};
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    async fn open_folder(temp_dir: &TempDir) -> LocalFolder {
        let folder = LocalFolder::open(temp_dir.path().to_path_buf(), Arc::new(AlwaysGrant));
        folder.request_permission(AccessMode::Read).await.unwrap();
        folder
    }

    fn paths(report: &ScanReport) -> Vec<String> {
        report.files.iter().map(|f| f.path.clone()).collect()
    }

    #[tokio::test]
    async fn test_scan_finds_supported_files_recursively() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("fiction/classics")).unwrap();
        fs::write(root.join("notes.txt"), "hi").unwrap();
        fs::write(root.join("fiction/novel.EPUB"), "zip").unwrap();
        fs::write(root.join("fiction/classics/old.pdf"), "%PDF-").unwrap();
        fs::write(root.join("fiction/cover.jpg"), "img").unwrap();
        fs::write(root.join(".bookshelf-sync.json"), "{}").unwrap();
        fs::create_dir_all(root.join(".trash")).unwrap();
        fs::write(root.join(".trash/deleted.txt"), "x").unwrap();

        let folder = open_folder(&temp_dir).await;
        let report = scan(&folder, &ScanLimits::default()).await.unwrap();

        assert_eq!(
            paths(&report),
            vec!["fiction/classics/old.pdf", "fiction/novel.EPUB", "notes.txt"]
        );
        assert!(!report.truncated);

        let notes = report.files.iter().find(|f| f.name == "notes.txt").unwrap();
        assert_eq!(notes.size, 2);
        assert_eq!(notes.format, DocumentFormat::Text);
        assert_eq!(notes.document_id(), Document::derive_id("notes.txt", 2));
    }

    #[tokio::test]
    async fn test_scan_respects_depth_limit() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("a/b")).unwrap();
        fs::write(root.join("top.txt"), "1").unwrap();
        fs::write(root.join("a/mid.txt"), "2").unwrap();
        fs::write(root.join("a/b/deep.txt"), "3").unwrap();

        let folder = open_folder(&temp_dir).await;
        let limits = ScanLimits {
            max_depth: 1,
            max_entries: 100,
        };
        let report = scan(&folder, &limits).await.unwrap();

        assert_eq!(paths(&report), vec!["a/mid.txt", "top.txt"]);
        assert!(report.truncated);
        assert_eq!(report.skipped[0].path, "a/b");
    }

    #[tokio::test]
    async fn test_scan_respects_entry_limit() {
        let temp_dir = TempDir::new().unwrap();
        for i in 0..5 {
            fs::write(temp_dir.path().join(format!("{}.txt", i)), "x").unwrap();
        }

        let folder = open_folder(&temp_dir).await;
        let limits = ScanLimits {
            max_depth: 4,
            max_entries: 3,
        };
        let report = scan(&folder, &limits).await.unwrap();

        assert_eq!(report.files.len(), 3);
        assert!(report.truncated);
        let mut sorted = paths(&report);
        sorted.sort();
        assert_eq!(paths(&report), sorted);
    }

    /// Fails to list one directory, delegating everything else
    struct BrokenDir {
        inner: LocalFolder,
        broken: &'static str,
    }

    #[async_trait::async_trait]
    impl FolderHandle for BrokenDir {
        fn name(&self) -> &str {
            self.inner.name()
        }
        fn reference(&self) -> std::path::PathBuf {
            self.inner.reference()
        }
        async fn query_permission(
            &self,
            mode: AccessMode,
        ) -> Result<crate::sync::folder::PermissionState, FolderError> {
            self.inner.query_permission(mode).await
        }
        async fn request_permission(
            &self,
            mode: AccessMode,
        ) -> Result<crate::sync::folder::PermissionState, FolderError> {
            self.inner.request_permission(mode).await
        }
        async fn list(&self, path: &str) -> Result<Vec<crate::sync::folder::FolderEntry>, FolderError> {
            if path == self.broken {
                return Err(FolderError::PermissionDenied(path.to_string()));
            }
            self.inner.list(path).await
        }
        async fn read_file(&self, path: &str) -> Result<Vec<u8>, FolderError> {
            self.inner.read_file(path).await
        }
        async fn write_file(&self, path: &str, bytes: &[u8]) -> Result<(), FolderError> {
            self.inner.write_file(path, bytes).await
        }
        async fn remove_file(&self, path: &str) -> Result<(), FolderError> {
            self.inner.remove_file(path).await
        }
    }

    #[tokio::test]
    async fn test_unreadable_subdirectory_is_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("locked")).unwrap();
        fs::create_dir_all(root.join("open")).unwrap();
        fs::write(root.join("locked/secret.txt"), "x").unwrap();
        fs::write(root.join("open/book.txt"), "x").unwrap();
        fs::write(root.join("root.txt"), "x").unwrap();

        let folder = BrokenDir {
            inner: open_folder(&temp_dir).await,
            broken: "locked",
        };
        let report = scan(&folder, &ScanLimits::default()).await.unwrap();

        assert_eq!(paths(&report), vec!["open/book.txt", "root.txt"]);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].path, "locked");
        assert!(!report.truncated);
    }

    #[tokio::test]
    async fn test_scan_without_permission_fails_at_root() {
        let temp_dir = TempDir::new().unwrap();
        let folder = LocalFolder::open(temp_dir.path().to_path_buf(), Arc::new(AlwaysGrant));
        assert!(matches!(
            scan(&folder, &ScanLimits::default()).await,
            Err(FolderError::PermissionDenied(_))
        ));
    }
}
