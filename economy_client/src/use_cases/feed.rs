// Live event feed: keeps a push connection alive and records what it delivers.

use crate::domain::{HubConnection, HubTransport, LiveEvent, ReconnectPolicy};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

/// Arrival-ordered event history. Only the newest `retention` events are kept in memory.
#[derive(Debug)]
pub struct EventLog {
    events: VecDeque<LiveEvent>,
    retention: usize,
    received: u64,
}

impl EventLog {
    pub fn new(retention: usize) -> Self {
        Self {
            events: VecDeque::new(),
            retention: retention.max(1),
            received: 0,
        }
    }

    pub fn push(&mut self, event: LiveEvent) {
        if self.events.len() == self.retention {
            self.events.pop_front();
        }
        self.events.push_back(event);
        self.received += 1;
    }

    // Last `n` events, oldest first.
    pub fn recent(&self, n: usize) -> Vec<LiveEvent> {
        let skip = self.events.len().saturating_sub(n);
        self.events.iter().skip(skip).cloned().collect()
    }

    pub fn received(&self) -> u64 {
        self.received
    }
}

type SharedLog = Arc<Mutex<EventLog>>;

fn lock(log: &SharedLog) -> MutexGuard<'_, EventLog> {
    log.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct LiveFeed {
    transport: Arc<dyn HubTransport>,
    policy: Arc<dyn ReconnectPolicy>,
    state_tx: watch::Sender<FeedState>,
    log: SharedLog,
    task: Option<JoinHandle<()>>,
}

impl LiveFeed {
    pub fn new(
        transport: Arc<dyn HubTransport>,
        policy: Arc<dyn ReconnectPolicy>,
        retention: usize,
    ) -> Self {
        // The sender keeps the current state even when nobody is subscribed.
        let (state_tx, _) = watch::channel(FeedState::Disconnected);
        Self {
            transport,
            policy,
            state_tx,
            log: Arc::new(Mutex::new(EventLog::new(retention))),
            task: None,
        }
    }

    /// Starts the connection task. A feed that is already live is left alone; one that
    /// settled in `Disconnected` is started again. The event log survives restarts.
    pub fn start(&mut self) {
        if let Some(task) = self.task.take() {
            if !task.is_finished() && self.state() != FeedState::Disconnected {
                self.task = Some(task);
                return;
            }
            task.abort();
        }
        self.state_tx.send_replace(FeedState::Connecting);
        self.task = Some(tokio::spawn(run_feed(
            self.transport.clone(),
            self.policy.clone(),
            self.state_tx.clone(),
            self.log.clone(),
        )));
    }

    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.state_tx.send_replace(FeedState::Disconnected);
    }

    pub fn state(&self) -> FeedState {
        *self.state_tx.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == FeedState::Connected
    }

    pub fn subscribe_state(&self) -> watch::Receiver<FeedState> {
        self.state_tx.subscribe()
    }

    pub fn recent(&self, n: usize) -> Vec<LiveEvent> {
        lock(&self.log).recent(n)
    }

    pub fn received(&self) -> u64 {
        lock(&self.log).received()
    }
}

impl Drop for LiveFeed {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn run_feed(
    transport: Arc<dyn HubTransport>,
    policy: Arc<dyn ReconnectPolicy>,
    state_tx: watch::Sender<FeedState>,
    log: SharedLog,
) {
    // A failed first connect is final; only established links are retried.
    let mut connection = match transport.connect().await {
        Ok(connection) => connection,
        Err(e) => {
            warn!(error = %e, "live feed connection failed");
            state_tx.send_replace(FeedState::Disconnected);
            return;
        }
    };

    loop {
        state_tx.send_replace(FeedState::Connected);
        info!("live feed connected");
        pump(connection.as_mut(), &log).await;

        state_tx.send_replace(FeedState::Reconnecting);
        info!("live feed reconnecting");
        match reconnect(transport.as_ref(), policy.as_ref()).await {
            Some(next) => connection = next,
            None => {
                warn!("live feed gave up reconnecting");
                state_tx.send_replace(FeedState::Disconnected);
                return;
            }
        }
    }
}

// Deliver messages until the link drops.
async fn pump(connection: &mut dyn HubConnection, log: &SharedLog) {
    loop {
        match connection.next_message().await {
            Ok(Some(content)) => lock(log).push(LiveEvent::received(content)),
            Ok(None) => {
                info!("live feed closed by peer");
                return;
            }
            Err(e) => {
                warn!(error = %e, "live feed connection lost");
                return;
            }
        }
    }
}

async fn reconnect(
    transport: &dyn HubTransport,
    policy: &dyn ReconnectPolicy,
) -> Option<Box<dyn HubConnection>> {
    let mut attempt = 0;
    while let Some(delay) = policy.next_delay(attempt) {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        match transport.connect().await {
            Ok(connection) => return Some(connection),
            Err(e) => warn!(attempt, error = %e, "live feed reconnect attempt failed"),
        }
        attempt += 1;
    }
    None
}
