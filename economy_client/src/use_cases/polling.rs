// Fixed-interval refresh loops, one task per resource.

use crate::domain::ClientError;
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, warn};

/// Latest outcome of a poll; `None` until the first fetch finishes.
pub type Snapshot<T> = Option<Result<T, ClientError>>;

/// Owns the polling tasks. Dropping it (or calling `shutdown`) aborts every loop, so no
/// fetch result is published after teardown.
#[derive(Default)]
pub struct Poller {
    tasks: Vec<JoinHandle<()>>,
}

impl Poller {
    pub fn new() -> Self {
        Self::default()
    }

    // The fetch is awaited inside the loop, so a slow response delays the next tick
    // instead of stacking requests; missed ticks are skipped.
    pub fn spawn<T, F, Fut>(
        &mut self,
        resource: &'static str,
        period: Duration,
        mut fetch: F,
    ) -> watch::Receiver<Snapshot<T>>
    where
        T: Send + Sync + 'static,
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, ClientError>> + Send + 'static,
    {
        let (tx, rx) = watch::channel(None);
        let task = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let result = fetch().await;
                if let Err(e) = &result {
                    warn!(resource, error = %e, "poll failed");
                }
                if tx.send(Some(result)).is_err() {
                    debug!(resource, "no subscribers left; poll loop exiting");
                    return;
                }
            }
        });
        self.tasks.push(task);
        rx
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn shutdown(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.shutdown();
    }
}
