use async_trait::async_trait;
use rust_decimal::Decimal;
use std::time::Duration;

use crate::domain::entities::{JoinCode, Player, PlayerId, Role, Session, Transaction};
use crate::domain::errors::ClientError;

// Join payload handed to the auth gateway. The credential only travels for GM joins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinRequest {
    pub code: JoinCode,
    pub player_name: String,
    pub role: Role,
    pub superuser_token: Option<String>,
}

// Session endpoints of the backend.
#[async_trait]
pub trait AuthGateway: Send + Sync {
    async fn get_join_code(&self) -> Result<JoinCode, ClientError>;
    async fn join(&self, req: JoinRequest) -> Result<Session, ClientError>;
    async fn poke(&self, player_id: PlayerId) -> Result<(), ClientError>;
}

// Ledger endpoints of the backend. Implementations do no local validation.
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    async fn list_players(&self) -> Result<Vec<Player>, ClientError>;
    async fn list_transactions(&self) -> Result<Vec<Transaction>, ClientError>;
    async fn list_player_transactions(
        &self,
        player_id: PlayerId,
    ) -> Result<Vec<Transaction>, ClientError>;
    async fn send(&self, from: PlayerId, to: PlayerId, amount: Decimal) -> Result<(), ClientError>;
    async fn grant(&self, player_id: PlayerId, amount: Decimal) -> Result<(), ClientError>;
}

// Key-value persistence for the active session.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn save(&self, session: &Session) -> Result<(), String>;
    // Corrupt or expired entries are cleared and reported as absent.
    async fn load(&self) -> Option<Session>;
    async fn clear(&self) -> Result<(), String>;
}

// Port for retrieving the current time.
pub trait Clock: Send + Sync {
    fn now_epoch_seconds(&self) -> u64;
}

// An established push-channel connection.
#[async_trait]
pub trait HubConnection: Send {
    // Ok(Some) delivers one payload, Ok(None) means the peer closed, Err means the link broke.
    async fn next_message(&mut self) -> Result<Option<String>, ClientError>;
}

// Opens push-channel connections; one call per connect or reconnect attempt.
#[async_trait]
pub trait HubTransport: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn HubConnection>, ClientError>;
}

// Decides how long to wait before reconnect attempt `attempt` (zero-based), or gives up.
pub trait ReconnectPolicy: Send + Sync {
    fn next_delay(&self, attempt: u32) -> Option<Duration>;
}
