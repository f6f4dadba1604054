use super::folder::{AccessMode, FolderError, FolderHandle, PermissionState};

/// Make sure `folder` may be accessed, asking the user only if needed.
///
/// `Ok(false)` means the user refused; the caller skips this cycle and keeps
/// the folder reference for a later retry. Errors are reserved for handles
/// that no longer point at a usable folder.
pub async fn verify_permission(
    folder: &dyn FolderHandle,
    require_write: bool,
) -> Result<bool, FolderError> {
    let mode = if require_write {
        AccessMode::ReadWrite
    } else {
        AccessMode::Read
    };

    if folder.query_permission(mode).await? == PermissionState::Granted {
        return Ok(true);
    }

    match folder.request_permission(mode).await? {
        PermissionState::Granted => Ok(true),
        state => {
            log::warn!(
                "Sync: access to '{}' not granted ({:?})",
                folder.name(),
                state
            );
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::folder::{AlwaysGrant, DenyAll, LocalFolder, PermissionPrompt};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;

    struct CountingPrompt(AtomicUsize);

    impl PermissionPrompt for CountingPrompt {
        fn confirm(&self, _folder: &str, _mode: AccessMode) -> bool {
            self.0.fetch_add(1, Ordering::SeqCst);
            true
        }
    }

    #[tokio::test]
    async fn test_granted_handle_does_not_prompt() {
        let temp_dir = TempDir::new().unwrap();
        let prompt = Arc::new(CountingPrompt(AtomicUsize::new(0)));
        let folder = LocalFolder::open(temp_dir.path().to_path_buf(), prompt.clone());

        assert!(verify_permission(&folder, true).await.unwrap());
        assert!(verify_permission(&folder, true).await.unwrap());
        assert!(verify_permission(&folder, false).await.unwrap());
        assert_eq!(prompt.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_denial_is_not_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let folder = LocalFolder::open(temp_dir.path().to_path_buf(), Arc::new(DenyAll));
        assert!(!verify_permission(&folder, true).await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_folder_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let folder = LocalFolder::open(temp_dir.path().join("moved"), Arc::new(AlwaysGrant));
        assert!(matches!(
            verify_permission(&folder, false).await,
            Err(FolderError::Unreachable(_))
        ));
    }
}
