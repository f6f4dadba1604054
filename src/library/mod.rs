//! Library module
//!
//! Documents, reader settings and the local repository they live in.

mod models;
mod storage;

pub use models::{
    now_millis, Chapter, Document, DocumentFormat, FolderReference, ProgressEntry, ReaderSettings,
    ReadingMode, SettingsRecord, Theme,
};
pub use storage::{DocumentRepository, LibraryError, LibraryStorage};
