use crate::domain::errors::ClientError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Ledger identity of a player. Never nil.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PlayerId(Uuid);

impl PlayerId {
    pub fn new(id: Uuid) -> Result<Self, ClientError> {
        if id.is_nil() {
            return Err(ClientError::validation("player id must not be nil"));
        }
        Ok(Self(id))
    }

    pub fn parse(value: &str) -> Result<Self, ClientError> {
        let id = Uuid::parse_str(value.trim())
            .map_err(|_| ClientError::validation(format!("malformed player id: {value}")))?;
        Self::new(id)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.hyphenated().fmt(f)
    }
}

impl FromStr for PlayerId {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PlayerId {
    type Error = ClientError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PlayerId> for String {
    fn from(id: PlayerId) -> Self {
        id.to_string()
    }
}

// Wire value used by the ledger for minted money.
const SYSTEM_COUNTERPARTY: &str = "system";

/// Sender side of a transaction: another player, or the system for grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Counterparty {
    System,
    Player(PlayerId),
}

impl Counterparty {
    pub fn player(&self) -> Option<PlayerId> {
        match self {
            Counterparty::System => None,
            Counterparty::Player(id) => Some(*id),
        }
    }
}

impl TryFrom<String> for Counterparty {
    type Error = ClientError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.eq_ignore_ascii_case(SYSTEM_COUNTERPARTY) {
            return Ok(Counterparty::System);
        }
        PlayerId::parse(&value).map(Counterparty::Player)
    }
}

impl From<Counterparty> for String {
    fn from(value: Counterparty) -> Self {
        match value {
            Counterparty::System => SYSTEM_COUNTERPARTY.to_string(),
            Counterparty::Player(id) => id.to_string(),
        }
    }
}

impl fmt::Display for Counterparty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Counterparty::System => f.write_str(SYSTEM_COUNTERPARTY),
            Counterparty::Player(id) => id.fmt(f),
        }
    }
}

/// A ledger participant as reported by the backend. The balance is authoritative there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: PlayerId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(with = "rust_decimal::serde::float")]
    pub balance: Decimal,
}

impl Player {
    // Name is display-only; fall back to the id when absent or blank.
    pub fn display_name(&self) -> String {
        match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => self.id.to_string(),
        }
    }
}

/// Immutable ledger entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: Uuid,
    pub from_player_id: Counterparty,
    pub to_player_id: PlayerId,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
}

impl Transaction {
    pub fn involves(&self, player: PlayerId) -> bool {
        self.to_player_id == player || self.from_player_id.player() == Some(player)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "GM")]
    GameMaster,
    Player,
    Spectator,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::GameMaster => "GM",
            Role::Player => "Player",
            Role::Spectator => "Spectator",
        }
    }

    pub fn can_send(&self) -> bool {
        !matches!(self, Role::Spectator)
    }

    pub fn can_grant(&self) -> bool {
        matches!(self, Role::GameMaster)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "GM" | "gm" | "GameMaster" => Ok(Role::GameMaster),
            "Player" | "player" => Ok(Role::Player),
            "Spectator" | "spectator" => Ok(Role::Spectator),
            other => Err(ClientError::validation(format!("invalid role: {other}"))),
        }
    }
}

/// The joined identity. Only one is active at a time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub player_id: PlayerId,
    pub player_name: String,
    pub role: Role,
}

// Short-lived, single-use credential fetched right before a join. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinCode(pub String);

impl JoinCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Push message, timestamped when it reached this client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveEvent {
    pub timestamp: DateTime<Utc>,
    pub content: String,
}

impl LiveEvent {
    pub fn received(content: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            content: content.into(),
        }
    }
}
