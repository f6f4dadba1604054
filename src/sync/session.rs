use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::config::ConnectionState;
use super::folder::FolderHandle;
use crate::library::{now_millis, FolderReference};

/// The connected folder and what one device knows about it.
///
/// Owned by the `SyncManager` behind an async mutex; a sync cycle borrows it
/// mutably for its whole run.
pub struct SyncSession {
    folder: Arc<dyn FolderHandle>,
    reference: FolderReference,
    connection: ConnectionState,
    /// Documents deleted here together with their file since the last write-back
    removed: HashSet<Uuid>,
    last_sync: Option<DateTime<Utc>>,
}

impl SyncSession {
    /// Session for a folder the user just picked
    pub fn new(folder: Arc<dyn FolderHandle>) -> Self {
        let reference = FolderReference {
            path: folder.reference(),
            name: folder.name().to_string(),
            connected_at: now_millis(),
        };
        Self::restored(folder, reference, ConnectionState::Connected)
    }

    /// Session for a folder remembered from an earlier run
    pub fn restored(
        folder: Arc<dyn FolderHandle>,
        reference: FolderReference,
        connection: ConnectionState,
    ) -> Self {
        Self {
            folder,
            reference,
            connection,
            removed: HashSet::new(),
            last_sync: None,
        }
    }

    pub fn folder(&self) -> Arc<dyn FolderHandle> {
        self.folder.clone()
    }

    pub fn reference(&self) -> &FolderReference {
        &self.reference
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    pub fn set_connection(&mut self, connection: ConnectionState) {
        self.connection = connection;
    }

    pub fn removed(&self) -> &HashSet<Uuid> {
        &self.removed
    }

    pub fn mark_removed(&mut self, id: Uuid) {
        self.removed.insert(id);
    }

    pub fn last_sync(&self) -> Option<DateTime<Utc>> {
        self.last_sync
    }

    /// Record a successful write-back
    pub fn mark_synced(&mut self, at: DateTime<Utc>) {
        self.removed.clear();
        self.last_sync = Some(at);
    }
}
