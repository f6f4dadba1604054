//! Bookshelf: an e-book library whose reading progress and settings follow
//! the reader between devices through a shared folder.
//!
//! - [`library`]: documents, settings and the local repository
//! - [`import`]: text, EPUB and PDF importers
//! - [`sync`]: folder access, scanning, the sync descriptor, merging and
//!   the orchestrator with its debounced auto-sync
//! - [`config`]: TOML application config

pub mod config;
pub mod import;
pub mod library;
pub mod sync;
