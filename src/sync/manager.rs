use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use crate::import::{DocumentImporter, ImportError};
use crate::library::{
    now_millis, Document, DocumentRepository, LibraryError, ReaderSettings, SettingsRecord,
};

use super::config::{
    ConnectionState, ImportFailure, ImportSummary, SyncConfig, SyncResult, SyncState, SyncStatus,
};
use super::descriptor::{read_descriptor, write_descriptor, SyncDescriptor};
use super::folder::{AccessMode, FolderError, FolderHandle, FolderOpener, PermissionState};
use super::merge::{adopt_progress, build_descriptor, merge};
use super::permission::verify_permission;
use super::scanner::{scan, ScanLimits, ScannedFile};
use super::scheduler::{SyncSchedulerMessage, SyncTarget};
use super::session::SyncSession;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Folder error: {0}")]
    Folder(#[from] FolderError),
    #[error("Library error: {0}")]
    Library(#[from] LibraryError),
    #[error("Import error: {0}")]
    Import(#[from] ImportError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Permission to access the sync folder was not granted")]
    PermissionDenied,
    #[error("No sync folder connected")]
    NotConnected,
}

impl SyncError {
    /// Connection state implied by this failure, if it says anything about access
    fn connection_state(&self) -> Option<ConnectionState> {
        match self {
            SyncError::PermissionDenied | SyncError::Folder(FolderError::PermissionDenied(_)) => {
                Some(ConnectionState::NeedsReconnect)
            }
            SyncError::Folder(FolderError::Unreachable(_)) => Some(ConnectionState::NeedsReselect),
            _ => None,
        }
    }
}

/// Documents imported from one scan
#[derive(Debug, Default)]
struct ImportBatch {
    documents: Vec<Document>,
    already_present: usize,
    failures: Vec<ImportFailure>,
}

/// Orchestrates folder sync: owns the session, runs cycles one at a time
/// and publishes status for the UI.
pub struct SyncManager {
    repository: Arc<dyn DocumentRepository>,
    importer: Arc<dyn DocumentImporter>,
    opener: Arc<dyn FolderOpener>,
    config: SyncConfig,
    /// Held for the whole of a cycle
    session: tokio::sync::Mutex<Option<SyncSession>>,
    status: Arc<watch::Sender<SyncStatus>>,
    /// Bumped on every status change so stale auto-reverts are dropped
    status_generation: Arc<AtomicU64>,
    scheduler: Mutex<Option<mpsc::Sender<SyncSchedulerMessage>>>,
}

impl SyncManager {
    /// Create a new sync manager
    pub fn new(
        repository: Arc<dyn DocumentRepository>,
        importer: Arc<dyn DocumentImporter>,
        opener: Arc<dyn FolderOpener>,
        config: SyncConfig,
    ) -> Self {
        let (status, _) = watch::channel(SyncStatus::default());
        Self {
            repository,
            importer,
            opener,
            config,
            session: tokio::sync::Mutex::new(None),
            status: Arc::new(status),
            status_generation: Arc::new(AtomicU64::new(0)),
            scheduler: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Route local-change notifications to an auto-sync scheduler
    pub fn attach_scheduler(&self, sender: mpsc::Sender<SyncSchedulerMessage>) {
        *self.scheduler.lock().unwrap_or_else(|e| e.into_inner()) = Some(sender);
    }

    fn notify_local_change(&self) {
        let scheduler = self.scheduler.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(sender) = scheduler.as_ref() {
            let _ = sender.try_send(SyncSchedulerMessage::LocalChanged);
        }
    }

    pub fn status(&self) -> SyncStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<SyncStatus> {
        self.status.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.status.borrow().connection == ConnectionState::Connected
    }

    /// Connect a folder the user picked and run a first sync.
    ///
    /// On denial any previous session is left as it was.
    pub async fn connect_folder(&self, folder: Arc<dyn FolderHandle>) -> Result<SyncResult, SyncError> {
        log::info!("Sync: connecting folder '{}'", folder.name());
        let mut guard = self.session.lock().await;

        if !verify_permission(folder.as_ref(), true).await? {
            return Err(SyncError::PermissionDenied);
        }

        let session = guard.insert(SyncSession::new(folder));
        self.repository.save_folder_reference(session.reference())?;
        self.publish_connection(session);

        self.run_cycle(session).await
    }

    /// Reopen the folder remembered from an earlier run, without prompting.
    ///
    /// The grant of a reopened handle is not guaranteed to survive, so the
    /// session usually comes back as `NeedsReconnect`.
    pub async fn restore_session(&self) -> Result<ConnectionState, SyncError> {
        let mut guard = self.session.lock().await;

        let Some(reference) = self.repository.load_folder_reference()? else {
            *guard = None;
            self.status.send_modify(|s| {
                s.connection = ConnectionState::Disconnected;
                s.folder = None;
            });
            return Ok(ConnectionState::Disconnected);
        };

        let folder = self.opener.open(&reference);
        let connection = match folder.query_permission(AccessMode::ReadWrite).await {
            Ok(PermissionState::Granted) => ConnectionState::Connected,
            Ok(_) | Err(FolderError::PermissionDenied(_)) => ConnectionState::NeedsReconnect,
            Err(FolderError::Unreachable(path)) => {
                log::warn!("Sync: remembered folder {} is gone", path.display());
                ConnectionState::NeedsReselect
            }
            Err(e) => return Err(e.into()),
        };

        log::info!(
            "Sync: restored folder '{}' ({:?})",
            reference.name,
            connection
        );
        let session = guard.insert(SyncSession::restored(folder, reference, connection));
        self.publish_connection(session);
        Ok(connection)
    }

    /// Ask again for access to the remembered folder and sync it
    pub async fn reconnect(&self) -> Result<SyncResult, SyncError> {
        let mut guard = self.session.lock().await;
        let session = guard.as_mut().ok_or(SyncError::NotConnected)?;

        let folder = session.folder();
        let granted = match verify_permission(folder.as_ref(), true).await {
            Ok(granted) => granted,
            Err(e) => {
                let err = SyncError::from(e);
                if let Some(connection) = err.connection_state() {
                    session.set_connection(connection);
                    self.publish_connection(session);
                }
                return Err(err);
            }
        };

        if !granted {
            session.set_connection(ConnectionState::NeedsReconnect);
            self.publish_connection(session);
            return Err(SyncError::PermissionDenied);
        }

        session.set_connection(ConnectionState::Connected);
        self.publish_connection(session);
        self.run_cycle(session).await
    }

    /// Forget the connected folder. The folder's contents are left alone.
    pub async fn disconnect(&self) -> Result<(), SyncError> {
        let mut guard = self.session.lock().await;
        if let Some(session) = guard.take() {
            log::info!("Sync: disconnected from '{}'", session.reference().name);
        }
        self.repository.clear_folder_reference()?;

        self.status_generation.fetch_add(1, Ordering::SeqCst);
        self.status.send_replace(SyncStatus::default());
        Ok(())
    }

    /// Run one sync cycle against the connected folder
    pub async fn sync(&self) -> Result<SyncResult, SyncError> {
        let mut guard = self.session.lock().await;
        let session = guard.as_mut().ok_or(SyncError::NotConnected)?;
        self.run_cycle(session).await
    }

    /// Import every new document in `folder` without connecting it
    pub async fn import_folder(&self, folder: &dyn FolderHandle) -> Result<ImportSummary, SyncError> {
        if !verify_permission(folder, false).await? {
            return Err(SyncError::PermissionDenied);
        }

        let known: HashSet<Uuid> = self.repository.get_all()?.iter().map(|d| d.id).collect();
        let report = scan(folder, &ScanLimits::from(&self.config)).await?;
        let batch = self.import_new(folder, &report.files, &known).await?;

        log::info!(
            "Imported {} documents from '{}' ({} failed)",
            batch.documents.len(),
            folder.name(),
            batch.failures.len()
        );
        if !batch.documents.is_empty() {
            self.notify_local_change();
        }

        Ok(ImportSummary {
            imported: batch.documents.len(),
            already_present: batch.already_present,
            import_failures: batch.failures,
            truncated: report.truncated,
        })
    }

    /// Store a new reading position for a document
    pub async fn record_progress(&self, id: Uuid, index: usize) -> Result<Document, SyncError> {
        let mut doc = self
            .repository
            .get(id)?
            .ok_or(LibraryError::NotFound(id))?;
        doc.record_progress(index, now_millis());
        self.repository.put(&doc)?;
        self.notify_local_change();
        Ok(doc)
    }

    pub async fn update_settings(&self, settings: ReaderSettings) -> Result<SettingsRecord, SyncError> {
        let record = SettingsRecord {
            settings,
            updated_at: Some(now_millis()),
        };
        self.repository.save_settings(&record)?;
        self.notify_local_change();
        Ok(record)
    }

    /// Delete a document, optionally removing its file from the sync folder.
    ///
    /// Returns whether a file was removed. Removed documents are left out of
    /// the next descriptor written, so other devices stop carrying their
    /// progress.
    pub async fn delete_document(&self, id: Uuid, remove_file: bool) -> Result<bool, SyncError> {
        let doc = self
            .repository
            .get(id)?
            .ok_or(LibraryError::NotFound(id))?;

        let mut file_removed = false;
        if remove_file {
            let mut guard = self.session.lock().await;
            let session = guard.as_mut().ok_or(SyncError::NotConnected)?;
            let folder = session.folder();

            if !verify_permission(folder.as_ref(), true).await? {
                return Err(SyncError::PermissionDenied);
            }

            let report = scan(folder.as_ref(), &ScanLimits::from(&self.config)).await?;
            match report.files.iter().find(|f| f.document_id() == id) {
                Some(file) => {
                    folder.remove_file(&file.path).await?;
                    log::info!("Removed '{}' from sync folder", file.path);
                    file_removed = true;
                }
                None => log::warn!(
                    "No file for '{}' in sync folder, deleting locally only",
                    doc.title
                ),
            }
            session.mark_removed(id);
        }

        self.repository.delete(id)?;
        log::info!("Deleted document '{}'", doc.title);
        self.notify_local_change();
        Ok(file_removed)
    }

    /// Run a cycle and map its outcome onto the published status
    async fn run_cycle(&self, session: &mut SyncSession) -> Result<SyncResult, SyncError> {
        self.status_generation.fetch_add(1, Ordering::SeqCst);
        self.status.send_modify(|s| {
            s.state = SyncState::Syncing;
            s.error = None;
        });

        let started = Instant::now();
        match self.cycle(session).await {
            Ok(mut result) => {
                result.duration_ms = started.elapsed().as_millis() as u64;
                session.set_connection(ConnectionState::Connected);
                log::info!(
                    "Sync: completed in {}ms ({} imported, {} positions adopted, settings changed: {})",
                    result.duration_ms,
                    result.imported,
                    result.progress_adopted,
                    result.settings_changed
                );
                self.finish(session, SyncState::Success, None);
                Ok(result)
            }
            Err(e) => {
                log::error!("Sync: cycle failed: {}", e);
                if let Some(connection) = e.connection_state() {
                    session.set_connection(connection);
                }
                self.finish(session, SyncState::Error, Some(e.to_string()));
                Err(e)
            }
        }
    }

    async fn cycle(&self, session: &mut SyncSession) -> Result<SyncResult, SyncError> {
        let folder = session.folder();
        log::info!("Sync: starting cycle for '{}'", folder.name());

        if !verify_permission(folder.as_ref(), true).await? {
            return Err(SyncError::PermissionDenied);
        }

        self.repository.save_folder_reference(session.reference())?;

        let remote = read_descriptor(folder.as_ref(), &self.config.descriptor_file).await?;

        let mut documents = self.repository.get_all()?;
        let known: HashSet<Uuid> = documents.iter().map(|d| d.id).collect();
        let report = scan(folder.as_ref(), &ScanLimits::from(&self.config)).await?;
        let batch = self.import_new(folder.as_ref(), &report.files, &known).await?;
        let imported = batch.documents.len();
        documents.extend(batch.documents);

        let settings = self.repository.load_settings()?;
        let outcome = merge(
            documents,
            &settings,
            remote.as_ref(),
            self.config.settings_policy,
        );

        let mut adopted = 0;
        for id in &outcome.adopted {
            if self.commit_adopted(*id, remote.as_ref())? {
                adopted += 1;
            }
        }

        let mut settings_changed = false;
        if outcome.settings_changed {
            let current = self.repository.load_settings()?;
            if current.updated_at == settings.updated_at {
                self.repository.save_settings(&outcome.settings)?;
                settings_changed = true;
            } else {
                log::info!("Sync: settings changed locally during the cycle, keeping them");
            }
        }

        if adopted > 0 || settings_changed {
            log::info!("Sync: committed {} remote positions locally", adopted);
        }

        // Re-read so anything recorded while the cycle ran is what goes out
        let documents = self.repository.get_all()?;
        let settings = self.repository.load_settings()?;
        let now = now_millis();
        let descriptor = build_descriptor(
            &documents,
            &settings,
            remote.as_ref(),
            session.removed(),
            now,
        );
        write_descriptor(folder.as_ref(), &self.config.descriptor_file, &descriptor).await?;
        session.mark_synced(now);

        Ok(SyncResult {
            imported,
            progress_adopted: adopted,
            settings_changed,
            remote_found: remote.is_some(),
            import_failures: batch.failures,
            duration_ms: 0,
        })
    }

    /// Store the remote position for `id` against the document as it is
    /// now. Progress recorded since the cycle's snapshot goes through the
    /// same rules, so a newer local position is kept.
    fn commit_adopted(&self, id: Uuid, remote: Option<&SyncDescriptor>) -> Result<bool, SyncError> {
        let Some(entry) = remote.and_then(|r| r.progress.get(&id)) else {
            return Ok(false);
        };
        let Some(mut doc) = self.repository.get(id)? else {
            log::debug!("Sync: {} was deleted during the cycle", id);
            return Ok(false);
        };

        if !adopt_progress(&mut doc, entry) {
            log::info!(
                "Sync: '{}' was read during the cycle, keeping its position",
                doc.title
            );
            return Ok(false);
        }
        self.repository.put(&doc)?;
        Ok(true)
    }

    /// Import scanned files not yet in the library. A file that fails to
    /// import is recorded and skipped.
    async fn import_new(
        &self,
        folder: &dyn FolderHandle,
        files: &[ScannedFile],
        known: &HashSet<Uuid>,
    ) -> Result<ImportBatch, SyncError> {
        let mut batch = ImportBatch::default();
        let mut seen = known.clone();

        for file in files {
            if !seen.insert(file.document_id()) {
                batch.already_present += 1;
                continue;
            }

            match self.import_one(folder, file).await {
                Ok(doc) => {
                    self.repository.put(&doc)?;
                    log::info!("Sync: imported '{}' from {}", doc.title, file.path);
                    batch.documents.push(doc);
                }
                Err(e) => {
                    log::warn!("Sync: skipping '{}': {}", file.path, e);
                    batch.failures.push(ImportFailure {
                        path: file.path.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        Ok(batch)
    }

    async fn import_one(&self, folder: &dyn FolderHandle, file: &ScannedFile) -> Result<Document, SyncError> {
        let bytes = folder.read_file(&file.path).await?;
        Ok(self.importer.import_file(&file.name, &bytes)?)
    }

    fn publish_connection(&self, session: &SyncSession) {
        let connection = session.connection();
        let folder = session.reference().name.clone();
        let last_sync = session.last_sync();
        self.status.send_modify(|s| {
            s.connection = connection;
            s.folder = Some(folder);
            if last_sync.is_some() {
                s.last_sync = last_sync;
            }
        });
    }

    /// Publish a terminal cycle state and schedule the revert to idle
    fn finish(&self, session: &SyncSession, state: SyncState, error: Option<String>) {
        self.publish_connection(session);
        self.status.send_modify(|s| {
            s.state = state;
            s.error = error;
        });

        let generation = self.status_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let counter = self.status_generation.clone();
        let status = self.status.clone();
        let delay = self.config.status_display_delay();

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if counter.load(Ordering::SeqCst) == generation {
                status.send_modify(|s| {
                    if matches!(s.state, SyncState::Success | SyncState::Error) {
                        s.state = SyncState::Idle;
                        s.error = None;
                    }
                });
            }
        });
    }
}

#[async_trait]
impl SyncTarget for SyncManager {
    async fn sync_requested(&self) {
        if !self.is_connected() {
            log::debug!("Sync: auto-sync skipped, no connected folder");
            return;
        }
        if let Err(e) = self.sync().await {
            log::warn!("Sync: auto-sync failed: {}", e);
        }
    }
}
