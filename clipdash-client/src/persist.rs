//! Second stage of the move pipeline: pushes change sets to the store.
//!
//! Drag-over changes are coalesced and sent once the pointer has been still
//! for the debounce window. A drop flushes immediately, taking any pending
//! drag-over changes with it. Flushes run in issuance order on one task and
//! are never retried; a failure is logged and the next refetch reconciles.

use std::time::Duration;

use clipdash_core::ChangeSet;
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
    time::{Instant, sleep_until},
};
use tracing::{debug, warn};

use crate::store_client::ItemStore;

#[derive(Debug)]
enum FlushCommand {
    Debounced(ChangeSet),
    Immediate(ChangeSet),
    Discard,
    Sync(oneshot::Sender<()>),
}

#[derive(Debug)]
pub struct Persister {
    tx: mpsc::UnboundedSender<FlushCommand>,
    task: JoinHandle<()>,
}

impl Persister {
    pub fn spawn<S: ItemStore>(store: S, debounce: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(store, debounce, rx));
        Self { tx, task }
    }

    /// Queues changes behind the debounce window.
    pub fn queue(&self, changes: ChangeSet) {
        if changes.is_empty() {
            return;
        }
        if self.tx.send(FlushCommand::Debounced(changes)).is_err() {
            warn!("persister stopped; dropping debounced changes");
        }
    }

    /// Flushes `changes` together with anything still pending, without waiting.
    pub fn flush_now(&self, changes: ChangeSet) {
        if self.tx.send(FlushCommand::Immediate(changes)).is_err() {
            warn!("persister stopped; dropping changes");
        }
    }

    /// Drops debounced changes that have not been sent yet.
    pub fn discard(&self) {
        if self.tx.send(FlushCommand::Discard).is_err() {
            warn!("persister stopped; nothing to discard");
        }
    }

    /// Resolves once every command sent before it has been handled.
    pub async fn sync(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(FlushCommand::Sync(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }

    /// Flushes what is pending and stops the task.
    pub async fn shutdown(self) {
        let Persister { tx, task } = self;
        drop(tx);
        if let Err(err) = task.await {
            warn!("persister task failed: {}", err);
        }
    }
}

async fn run<S: ItemStore>(
    store: S,
    debounce: Duration,
    mut rx: mpsc::UnboundedReceiver<FlushCommand>,
) {
    let mut pending = ChangeSet::default();
    let mut deadline: Option<Instant> = None;

    loop {
        tokio::select! {
            command = rx.recv() => match command {
                Some(FlushCommand::Debounced(changes)) => {
                    pending.merge(changes);
                    deadline = Some(Instant::now() + debounce);
                }
                Some(FlushCommand::Immediate(changes)) => {
                    pending.merge(changes);
                    deadline = None;
                    flush(&store, pending.take()).await;
                }
                Some(FlushCommand::Discard) => {
                    let dropped = pending.take();
                    deadline = None;
                    debug!(moved = dropped.moved.len(), "discarded pending changes");
                }
                Some(FlushCommand::Sync(done)) => {
                    let _ = done.send(());
                }
                None => {
                    flush(&store, pending.take()).await;
                    break;
                }
            },
            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                deadline = None;
                flush(&store, pending.take()).await;
            }
        }
    }
}

async fn flush<S: ItemStore>(store: &S, changes: ChangeSet) {
    if changes.is_empty() {
        return;
    }
    let ChangeSet {
        moved,
        tabs,
        pinned,
    } = changes;
    debug!(
        moved = moved.len(),
        tabs = tabs.len(),
        pinned = pinned.len(),
        "flushing changes"
    );

    if !moved.is_empty()
        && let Err(err) = store.apply_moved_items(moved).await
    {
        warn!("moved items flush failed: {}", err);
    }
    if !tabs.is_empty()
        && let Err(err) = store.update_tab_order(tabs).await
    {
        warn!("tab order flush failed: {}", err);
    }
    if !pinned.is_empty()
        && let Err(err) = store.update_pinned_clips(pinned).await
    {
        warn!("pinned clips flush failed: {}", err);
    }
}
