use anyhow::{Context, Result};
use bookshelf_lib::sync::start_sync_scheduler;

use crate::app::App;
use crate::render::terminal::{render_status, render_sync_result};
use crate::watcher::start_library_watcher;

/// Sync once, then keep syncing after local changes until Ctrl-C
pub async fn run(app: &App, use_color: bool) -> Result<()> {
    let result = app.sync_session().await?;
    println!("{}", render_sync_result(&result, use_color));

    let scheduler = start_sync_scheduler(app.manager.clone(), app.config.sync.debounce_window());
    app.manager.attach_scheduler(scheduler.sender_clone());

    // Must stay alive for the watch to continue
    let _watcher = start_library_watcher(app.storage.base_path(), scheduler.sender_clone())
        .context("Failed to watch library")?;

    let mut status = app.manager.subscribe_status();
    println!(
        "Watching for changes (debounce {}ms). Press Ctrl-C to stop.",
        app.config.sync.debounce_ms
    );

    loop {
        tokio::select! {
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = status.borrow_and_update().clone();
                println!("{}", render_status(&current, use_color));
            }
            _ = tokio::signal::ctrl_c() => {
                println!("Stopping");
                break;
            }
        }
    }

    scheduler.shutdown();
    scheduler.stopped().await;
    Ok(())
}
