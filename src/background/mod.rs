//! Periodic background sync.
//!
//! [`SyncScheduler`] fires the configured sync tag through a [`WorkerHandle`]
//! on a fixed interval until told to stop, the way a browser replays a
//! registered sync once connectivity returns.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, info, warn};

use crate::worker::{EventOutcome, WorkerHandle};

/// Counters kept across a scheduler's lifetime.
#[derive(Debug, Default)]
pub struct SyncStats {
    fired: AtomicU64,
    failed: AtomicU64,
}

impl SyncStats {
    /// Sync events the worker accepted.
    pub fn fired(&self) -> u64 {
        self.fired.load(Ordering::Relaxed)
    }

    /// Sync events that could not be delivered or whose work failed.
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

/// A running periodic sync task.
#[derive(Debug)]
pub struct SyncScheduler {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
    stats: Arc<SyncStats>,
}

impl SyncScheduler {
    /// Starts firing `tag` every `period`. The first sync happens one period
    /// from now.
    pub fn spawn(worker: WorkerHandle, tag: impl Into<String>, period: Duration) -> Self {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let stats = Arc::new(SyncStats::default());
        let task = tokio::spawn(run(worker, tag.into(), period, shutdown_rx, Arc::clone(&stats)));
        Self {
            shutdown,
            task,
            stats,
        }
    }

    pub fn stats(&self) -> &SyncStats {
        &self.stats
    }

    /// Stops the loop and waits for an in-flight sync to finish.
    pub async fn shutdown(self) -> Arc<SyncStats> {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            warn!(error = %e, "sync scheduler task failed");
        }
        self.stats
    }
}

async fn run(
    worker: WorkerHandle,
    tag: String,
    period: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
    stats: Arc<SyncStats>,
) {
    let period = period.max(Duration::from_millis(1));
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(tag = %tag, period = ?period, "periodic background sync started");

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                match worker.sync(tag.as_str()).await {
                    Ok(EventOutcome::Ignored) => {
                        debug!(tag = %tag, "sync tag ignored by worker");
                    }
                    Ok(_) => {
                        stats.fired.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => {
                        stats.failed.fetch_add(1, Ordering::Relaxed);
                        warn!(tag = %tag, error = %e, "periodic sync failed");
                    }
                }
            }
        }
    }

    info!(
        tag = %tag,
        fired = stats.fired(),
        failed = stats.failed(),
        "periodic background sync stopped"
    );
}
