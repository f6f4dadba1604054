pub mod connect;
pub mod delete;
pub mod disconnect;
pub mod import;
pub mod list;
pub mod progress;
pub mod settings;
pub mod status;
pub mod sync;
pub mod watch;
