//! Debounced auto-sync
//!
//! Local mutations send `LocalChanged`; a single consumer task collapses
//! bursts of them into one sync once the library has been quiet for the
//! debounce window.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Messages to control the sync scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncSchedulerMessage {
    /// Local documents or settings changed; (re)start the debounce timer
    LocalChanged,
    /// Sync right away, dropping any pending debounce
    SyncNow,
    /// Stop the consumer, flushing a pending sync first
    Shutdown,
}

/// Handle for the auto-sync scheduler
pub struct SyncScheduler {
    sender: mpsc::Sender<SyncSchedulerMessage>,
}

impl SyncScheduler {
    pub fn local_changed(&self) {
        let _ = self.sender.try_send(SyncSchedulerMessage::LocalChanged);
    }

    pub fn sync_now(&self) {
        let _ = self.sender.try_send(SyncSchedulerMessage::SyncNow);
    }

    pub fn shutdown(&self) {
        let _ = self.sender.try_send(SyncSchedulerMessage::Shutdown);
    }

    /// Get a clone of the internal sender for external message producers
    pub fn sender_clone(&self) -> mpsc::Sender<SyncSchedulerMessage> {
        self.sender.clone()
    }

    /// Wait until the consumer task has exited
    pub async fn stopped(&self) {
        self.sender.closed().await;
    }
}

/// Whatever the scheduler keeps in sync
#[async_trait]
pub trait SyncTarget: Send + Sync + 'static {
    async fn sync_requested(&self);
}

/// Resettable deadline: every signal pushes it one window into the future
#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            deadline: None,
        }
    }

    pub fn signal(&mut self) {
        self.deadline = Some(Instant::now() + self.window);
    }

    pub fn clear(&mut self) {
        self.deadline = None;
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Whether the deadline has passed
    #[cfg(test)]
    pub fn is_due(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

/// Queue depth; senders drop signals when full, which is harmless since
/// pending signals already guarantee a sync
const QUEUE_CAPACITY: usize = 64;

/// Start the auto-sync consumer.
///
/// Must be called from within a tokio runtime.
pub fn start_sync_scheduler<T: SyncTarget>(target: Arc<T>, window: Duration) -> SyncScheduler {
    let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);

    tokio::spawn(async move {
        sync_scheduler_loop(target, window, rx).await;
    });

    SyncScheduler { sender: tx }
}

async fn sync_scheduler_loop<T: SyncTarget>(
    target: Arc<T>,
    window: Duration,
    mut receiver: mpsc::Receiver<SyncSchedulerMessage>,
) {
    log::info!("Sync scheduler started (debounce {}ms)", window.as_millis());
    let mut debouncer = Debouncer::new(window);

    loop {
        let deadline = debouncer.deadline();

        tokio::select! {
            _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                debouncer.clear();
                log::debug!("Sync scheduler: debounce elapsed, syncing");
                target.sync_requested().await;
            }
            msg = receiver.recv() => {
                match msg {
                    Some(SyncSchedulerMessage::LocalChanged) => {
                        debouncer.signal();
                    }
                    Some(SyncSchedulerMessage::SyncNow) => {
                        debouncer.clear();
                        target.sync_requested().await;
                    }
                    Some(SyncSchedulerMessage::Shutdown) | None => {
                        if debouncer.is_pending() {
                            log::info!("Sync scheduler: flushing pending sync before shutdown");
                            target.sync_requested().await;
                        }
                        log::info!("Sync scheduler shutting down");
                        break;
                    }
                }
            }
        }
    }
}
