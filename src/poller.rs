use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures_util::future::join;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::state::EntityStore;

/// Background refresher of health and jobs.
///
/// Ticks immediately, then every `period`. Each tick runs `fetch_health` and
/// `fetch_jobs` concurrently; their failures land in the store's error slot
/// and never stop later ticks. No backoff, no jitter.
///
/// The task holds only a weak reference to the store and exits once the
/// store is gone. Dropping the handle aborts the task.
pub struct PollHandle {
    task: JoinHandle<()>,
    ticks: Arc<AtomicU64>,
}

impl PollHandle {
    pub fn spawn(store: &Arc<EntityStore>, period: Duration) -> Self {
        let ticks = Arc::new(AtomicU64::new(0));
        let task = tokio::spawn(run(Arc::downgrade(store), period, Arc::clone(&ticks)));
        Self { task, ticks }
    }

    /// Completed ticks since spawn.
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub fn stop(self) {
        info!(ticks = self.ticks(), "Polling stopped");
        // Drop aborts the task.
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run(store: Weak<EntityStore>, period: Duration, ticks: Arc<AtomicU64>) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let Some(store) = store.upgrade() else {
            debug!("Store dropped, poller exiting");
            return;
        };
        join(store.fetch_health(), store.fetch_jobs()).await;
        let n = ticks.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(tick = n, "Poll tick complete");
    }
}
