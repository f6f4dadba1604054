//! Library directory watcher.
//!
//! Watches the data directory for document and settings changes made by
//! other processes (for example `bookshelf-cli progress` in another shell)
//! and feeds them to the auto-sync scheduler.

use std::path::Path;
use std::time::Duration;

use notify::{Config, Event, EventKind, PollWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use bookshelf_lib::sync::SyncSchedulerMessage;

/// How often the poll watcher checks for changes.
const POLL_INTERVAL: Duration = Duration::from_millis(750);

/// Whether a changed path is library state that should be synced
fn is_library_change(path: &Path, data_dir: &Path) -> bool {
    let Ok(rel) = path.strip_prefix(data_dir) else {
        return false;
    };
    let components: Vec<&str> = rel
        .components()
        .filter_map(|c| c.as_os_str().to_str())
        .collect();

    match components.as_slice() {
        // documents/{id}.json
        ["documents", file] => file.ends_with(".json") && !file.ends_with(".tmp"),
        ["settings.json"] => true,
        _ => false,
    }
}

/// Start watching `data_dir`. Returns the watcher handle (must be kept alive).
pub fn start_library_watcher(
    data_dir: &Path,
    sender: mpsc::Sender<SyncSchedulerMessage>,
) -> Result<PollWatcher, notify::Error> {
    let root = data_dir.to_path_buf();
    let config = Config::default().with_poll_interval(POLL_INTERVAL);

    let mut watcher = PollWatcher::new(
        move |res: Result<Event, notify::Error>| {
            let event = match res {
                Ok(e) => e,
                Err(e) => {
                    log::warn!("[watcher] Watch error: {}", e);
                    return;
                }
            };

            match event.kind {
                EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) => {}
                _ => return,
            }

            if event.paths.iter().any(|p| is_library_change(p, &root)) {
                log::debug!("[watcher] Library changed: {:?}", event.paths);
                let _ = sender.try_send(SyncSchedulerMessage::LocalChanged);
            }
        },
        config,
    )?;

    watcher.watch(data_dir, RecursiveMode::Recursive)?;
    log::info!("[watcher] Watching {}", data_dir.display());

    Ok(watcher)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_changes_are_classified() {
        let root = Path::new("/data/bookshelf");
        assert!(is_library_change(&root.join("documents/abc.json"), root));
        assert!(is_library_change(&root.join("settings.json"), root));
        assert!(!is_library_change(&root.join("documents/abc.json.tmp"), root));
        assert!(!is_library_change(&root.join("folder.json"), root));
        assert!(!is_library_change(Path::new("/elsewhere/settings.json"), root));
    }
}
