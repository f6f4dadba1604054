use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default name of the state file kept in the root of the synced folder
pub const DEFAULT_DESCRIPTOR_FILE: &str = ".bookshelf-sync.json";

/// Tunables for folder sync
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case", default)]
pub struct SyncConfig {
    /// Quiet period after the last local change before an automatic sync runs
    pub debounce_ms: u64,
    /// How long `success` / `error` stay visible before reverting to `idle`
    pub status_display_ms: u64,
    /// Deepest directory level the scanner descends into (root is 0)
    pub max_scan_depth: usize,
    /// Upper bound on directory entries visited in one scan
    pub max_scan_entries: usize,
    /// Name of the state file in the folder root
    pub descriptor_file: String,
    /// How remote settings are reconciled with local ones
    pub settings_policy: SettingsPolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 3_000,
            status_display_ms: 3_000,
            max_scan_depth: 16,
            max_scan_entries: 10_000,
            descriptor_file: DEFAULT_DESCRIPTOR_FILE.to_string(),
            settings_policy: SettingsPolicy::RemoteWins,
        }
    }
}

impl SyncConfig {
    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn status_display_delay(&self) -> Duration {
        Duration::from_millis(self.status_display_ms)
    }
}

/// Settings reconciliation policy.
///
/// Progress is always reconciled by timestamp. Settings historically were
/// not: the remote snapshot simply overwrote local fields. `NewerWins`
/// applies the same timestamp rule used for progress instead.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SettingsPolicy {
    #[default]
    RemoteWins,
    NewerWins,
}

/// Current sync cycle state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    /// Nothing running
    #[default]
    Idle,
    /// A cycle is in flight
    Syncing,
    /// Last cycle succeeded (reverts to idle)
    Success,
    /// Last cycle failed (reverts to idle)
    Error,
}

/// State of the folder connection
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum ConnectionState {
    /// No folder configured
    #[default]
    Disconnected,
    /// Folder handle held and permission verified
    Connected,
    /// Folder remembered but access must be granted again
    NeedsReconnect,
    /// Folder no longer reachable; the user has to pick it again
    NeedsReselect,
}

/// Sync status for the UI
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub state: SyncState,
    pub connection: ConnectionState,
    /// Display name of the connected folder
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder: Option<String>,
    /// Last successful sync timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_sync: Option<DateTime<Utc>>,
    /// Error message if state is Error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A file that could not be imported during a cycle
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImportFailure {
    pub path: String,
    pub error: String,
}

/// Result of one sync cycle
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    /// Documents newly imported from the folder
    pub imported: usize,
    /// Documents that adopted remote progress
    pub progress_adopted: usize,
    /// Whether remote settings changed local settings
    pub settings_changed: bool,
    /// Whether a remote descriptor existed and was readable
    pub remote_found: bool,
    /// Files skipped because they failed to import
    pub import_failures: Vec<ImportFailure>,
    /// Duration of sync in milliseconds
    pub duration_ms: u64,
}

impl SyncResult {
    /// Whether the local library changed as a result of the cycle
    pub fn local_changed(&self) -> bool {
        self.imported > 0 || self.progress_adopted > 0 || self.settings_changed
    }
}

/// Result of importing a folder without syncing it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub imported: usize,
    /// Supported files whose document already exists locally
    pub already_present: usize,
    pub import_failures: Vec<ImportFailure>,
    /// The scan stopped at a depth or entry limit
    pub truncated: bool,
}
