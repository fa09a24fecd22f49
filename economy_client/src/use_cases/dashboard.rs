// Dashboard controller: the one place holding the active session and its background work.

use crate::domain::{
    AuthGateway, ClientError, LedgerGateway, Player, PlayerId, Role, Session, SessionStore,
    Transaction, TransferLimits,
};
use crate::use_cases::join::JoinClient;
use crate::use_cases::polling::{Poller, Snapshot};
use crate::use_cases::queries::{LedgerQueries, SharedCache};
use crate::use_cases::transfer::TransferClient;
use rust_decimal::Decimal;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    // We use Arc<dyn Trait> to hold any implementation (dependency injection).
    pub auth: Arc<dyn AuthGateway>,
    pub ledger: Arc<dyn LedgerGateway>,
    pub sessions: Arc<dyn SessionStore>,
    pub limits: TransferLimits,
    pub poll_interval: Duration,
}

// Which slice of history a dashboard shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryScope {
    Player(PlayerId),
    Everyone,
}

impl HistoryScope {
    pub fn for_session(session: &Session) -> Self {
        match session.role {
            Role::Player => HistoryScope::Player(session.player_id),
            Role::GameMaster | Role::Spectator => HistoryScope::Everyone,
        }
    }
}

/// Receivers for the refresh loops of a running dashboard.
pub struct DashboardFeeds {
    pub scope: HistoryScope,
    pub players: watch::Receiver<Snapshot<Vec<Player>>>,
    pub transactions: watch::Receiver<Snapshot<Vec<Transaction>>>,
}

pub struct Dashboard {
    join: JoinClient,
    queries: LedgerQueries,
    transfers: TransferClient,
    poll_interval: Duration,
    session: Option<Session>,
    poller: Option<Poller>,
}

impl Dashboard {
    pub fn new(state: AppState) -> Self {
        let cache = SharedCache::default();
        Self {
            join: JoinClient::new(state.auth, state.sessions),
            queries: LedgerQueries::new(state.ledger.clone(), cache.clone()),
            transfers: TransferClient::new(state.ledger, cache, state.limits),
            poll_interval: state.poll_interval,
            session: None,
            poller: None,
        }
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn queries(&self) -> &LedgerQueries {
        &self.queries
    }

    // Restoring replaces any active session the same way a join does.
    pub async fn restore(&mut self) -> Option<&Session> {
        let restored = self.join.restore().await;
        self.teardown();
        self.session = restored;
        self.session.as_ref()
    }

    // Joining replaces any active session, so running loops for the old one are dropped.
    pub async fn join(
        &mut self,
        player_name: &str,
        role: Role,
        superuser_token: Option<&str>,
    ) -> Result<&Session, ClientError> {
        let session = self.join.join(player_name, role, superuser_token).await?;
        self.teardown();
        Ok(&*self.session.insert(session))
    }

    pub async fn clear_session(&mut self) {
        self.teardown();
        self.session = None;
        self.join.clear().await;
    }

    pub async fn poke(&self) {
        if let Some(heartbeat) = self.heartbeat() {
            heartbeat.await;
        }
    }

    /// Detached heartbeat for the active session, so callers can spawn it instead of
    /// waiting on a slow backend.
    pub fn heartbeat(&self) -> Option<impl Future<Output = ()> + Send + 'static> {
        let player_id = self.session.as_ref()?.player_id;
        let join = self.join.clone();
        Some(async move { join.poke(player_id).await })
    }

    fn active_session(&self) -> Result<&Session, ClientError> {
        self.session
            .as_ref()
            .ok_or_else(|| ClientError::Auth("join a game first".to_string()))
    }

    pub async fn send_to(
        &self,
        to: PlayerId,
        amount: Decimal,
        memo: Option<&str>,
    ) -> Result<(), ClientError> {
        let session = self.active_session()?;
        if !session.role.can_send() {
            return Err(ClientError::validation("spectators cannot send money"));
        }
        self.transfers
            .send(session.player_id, to, amount, memo)
            .await
    }

    pub async fn grant_to(&self, player_id: PlayerId, amount: Decimal) -> Result<(), ClientError> {
        let session = self.active_session()?;
        self.transfers.grant(session, player_id, amount).await
    }

    /// Spawns the refresh loops for the active session, replacing any already running.
    pub fn start_polling(&mut self) -> Result<DashboardFeeds, ClientError> {
        let scope = HistoryScope::for_session(self.active_session()?);
        self.teardown();
        let mut poller = Poller::new();

        let queries = self.queries.clone();
        let players = poller.spawn("players", self.poll_interval, move || {
            let queries = queries.clone();
            async move { queries.list_players().await }
        });

        let queries = self.queries.clone();
        let transactions = poller.spawn("transactions", self.poll_interval, move || {
            let queries = queries.clone();
            async move {
                match scope {
                    HistoryScope::Player(player_id) => {
                        queries.list_player_transactions(player_id).await
                    }
                    HistoryScope::Everyone => queries.list_transactions().await,
                }
            }
        });

        info!(?scope, interval_ms = self.poll_interval.as_millis(), "polling started");
        self.poller = Some(poller);
        Ok(DashboardFeeds {
            scope,
            players,
            transactions,
        })
    }

    pub fn teardown(&mut self) {
        if let Some(mut poller) = self.poller.take() {
            poller.shutdown();
            info!("polling stopped");
        }
    }
}

impl Drop for Dashboard {
    fn drop(&mut self) {
        self.teardown();
    }
}
