pub mod config;
pub mod descriptor;
pub mod folder;
pub mod merge;
pub mod scanner;
pub mod scheduler;

mod manager;
mod permission;
mod session;

pub use config::{
    ConnectionState, ImportFailure, ImportSummary, SettingsPolicy, SyncConfig, SyncResult,
    SyncState, SyncStatus, DEFAULT_DESCRIPTOR_FILE,
};
pub use descriptor::{read_descriptor, write_descriptor, SyncDescriptor};
pub use folder::{
    AccessMode, AlwaysGrant, DenyAll, EntryKind, FolderEntry, FolderError, FolderHandle,
    FolderOpener, LocalFolder, LocalFolderOpener, PermissionPrompt, PermissionState,
    TerminalPrompt,
};
pub use manager::{SyncError, SyncManager};
pub use merge::{build_descriptor, merge, MergeOutcome};
pub use permission::verify_permission;
pub use scanner::{scan, ScanLimits, ScanReport, ScannedFile, SkippedEntry};
pub use scheduler::{start_sync_scheduler, Debouncer, SyncScheduler, SyncSchedulerMessage, SyncTarget};
pub use session::SyncSession;
