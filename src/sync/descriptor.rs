//! Sync descriptor file
//!
//! The descriptor is the only shared state between devices: a timestamp, a
//! settings snapshot and per-document progress. It never carries document
//! content. Reads are forgiving (absent or corrupt means "no remote state");
//! writes replace the whole file and report every failure.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use super::folder::{FolderError, FolderHandle};
use super::manager::SyncError;
use crate::library::ProgressEntry;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SyncDescriptor {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
    /// Snapshot of the reader settings, kept as raw fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<serde_json::Map<String, serde_json::Value>>,
    /// Sorted by id so unchanged state serializes identically
    #[serde(default, deserialize_with = "deserialize_progress")]
    pub progress: BTreeMap<Uuid, ProgressEntry>,
}

/// Parse progress entries one by one. An entry with a bad key or shape is
/// dropped on its own so the rest of the map survives.
fn deserialize_progress<'de, D>(deserializer: D) -> Result<BTreeMap<Uuid, ProgressEntry>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Map<String, serde_json::Value>>::deserialize(deserializer)?;

    let mut progress = BTreeMap::new();
    for (key, value) in raw.into_iter().flatten() {
        let id = match Uuid::parse_str(&key) {
            Ok(id) => id,
            Err(e) => {
                log::warn!("Sync: skipping progress entry '{}': {}", key, e);
                continue;
            }
        };
        match serde_json::from_value::<ProgressEntry>(value) {
            Ok(entry) => {
                progress.insert(id, entry);
            }
            Err(e) => log::warn!("Sync: skipping progress entry '{}': {}", key, e),
        }
    }
    Ok(progress)
}

impl SyncDescriptor {
    pub fn new(updated_at: DateTime<Utc>) -> Self {
        Self {
            updated_at,
            settings: None,
            progress: BTreeMap::new(),
        }
    }
}

/// Read the descriptor from the folder root.
///
/// Returns `Ok(None)` when the file is missing or not a valid descriptor.
/// Any other failure to read it (for example revoked access) is an error.
pub async fn read_descriptor(
    folder: &dyn FolderHandle,
    file_name: &str,
) -> Result<Option<SyncDescriptor>, FolderError> {
    let bytes = match folder.read_file(file_name).await {
        Ok(bytes) => bytes,
        Err(FolderError::NotFound(_)) => {
            log::info!("Sync: no descriptor in '{}' yet", folder.name());
            return Ok(None);
        }
        Err(e) => return Err(e),
    };

    match serde_json::from_slice::<SyncDescriptor>(&bytes) {
        Ok(descriptor) => Ok(Some(descriptor)),
        Err(e) => {
            log::warn!(
                "Sync: ignoring unreadable descriptor in '{}': {}",
                folder.name(),
                e
            );
            Ok(None)
        }
    }
}

/// Replace the descriptor in the folder root
pub async fn write_descriptor(
    folder: &dyn FolderHandle,
    file_name: &str,
    descriptor: &SyncDescriptor,
) -> Result<(), SyncError> {
    let json = serde_json::to_vec_pretty(descriptor)?;
    folder.write_file(file_name, &json).await?;
    log::debug!(
        "Sync: wrote descriptor with {} progress entries to '{}'",
        descriptor.progress.len(),
        folder.name()
    );
    Ok(())
}
