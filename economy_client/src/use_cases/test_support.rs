use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::{
    AuthGateway, ClientError, Clock, Counterparty, HubConnection, HubTransport, JoinCode,
    JoinRequest, LedgerGateway, Player, PlayerId, ReconnectPolicy, Role, Session, Transaction,
};

// Deterministic, non-nil player ids for tests.
pub(crate) fn player_id(n: u128) -> PlayerId {
    PlayerId::new(Uuid::from_u128(n.max(1))).expect("non-nil uuid")
}

// Shared fixed time source for deterministic tests.
pub(crate) struct FixedClock(pub(crate) u64);

impl Clock for FixedClock {
    fn now_epoch_seconds(&self) -> u64 {
        self.0
    }
}

#[derive(Default)]
struct LedgerBook {
    players: Vec<Player>,
    transactions: Vec<Transaction>,
    mutation_calls: usize,
    read_failure: Option<ClientError>,
    clock: i64,
}

impl LedgerBook {
    fn next_timestamp(&mut self) -> DateTime<Utc> {
        self.clock += 1;
        Utc.timestamp_opt(1_700_000_000 + self.clock, 0)
            .single()
            .expect("valid timestamp")
    }

    fn player_mut(&mut self, id: PlayerId) -> Result<&mut Player, ClientError> {
        self.players
            .iter_mut()
            .find(|player| player.id == id)
            .ok_or_else(|| ClientError::NotFound("Player not found".to_string()))
    }

    fn record(&mut self, from: Counterparty, to: PlayerId, amount: Decimal) {
        let timestamp = self.next_timestamp();
        self.transactions.push(Transaction {
            id: Uuid::new_v4(),
            from_player_id: from,
            to_player_id: to,
            amount,
            timestamp,
            memo: None,
        });
    }

    fn take_read_failure(&mut self) -> Result<(), ClientError> {
        match self.read_failure.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

// In-memory ledger that behaves like the backend and counts mutation requests.
#[derive(Clone, Default)]
pub(crate) struct RecordingLedger {
    book: Arc<Mutex<LedgerBook>>,
}

impl RecordingLedger {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn book(&self) -> std::sync::MutexGuard<'_, LedgerBook> {
        self.book.lock().expect("ledger mutex poisoned")
    }

    pub(crate) fn add_player(&self, id: PlayerId, name: &str, balance: Decimal) {
        self.book().players.push(Player {
            id,
            name: Some(name.to_string()),
            balance,
        });
    }

    // Applies a transfer directly, the way the backend would.
    pub(crate) fn send_money(
        &self,
        from: PlayerId,
        to: PlayerId,
        amount: Decimal,
    ) -> Result<(), ClientError> {
        let mut book = self.book();
        book.player_mut(to)?;
        let sender = book.player_mut(from)?;
        if sender.balance < amount {
            return Err(ClientError::Validation("Insufficient balance".to_string()));
        }
        sender.balance -= amount;
        book.player_mut(to)?.balance += amount;
        book.record(Counterparty::Player(from), to, amount);
        Ok(())
    }

    pub(crate) fn balance(&self, id: PlayerId) -> Option<Decimal> {
        self.book()
            .players
            .iter()
            .find(|player| player.id == id)
            .map(|player| player.balance)
    }

    pub(crate) fn mutation_calls(&self) -> usize {
        self.book().mutation_calls
    }

    pub(crate) fn fail_next_read(&self, err: ClientError) {
        self.book().read_failure = Some(err);
    }
}

#[async_trait]
impl LedgerGateway for RecordingLedger {
    async fn list_players(&self) -> Result<Vec<Player>, ClientError> {
        let mut book = self.book();
        book.take_read_failure()?;
        Ok(book.players.clone())
    }

    async fn list_transactions(&self) -> Result<Vec<Transaction>, ClientError> {
        let mut book = self.book();
        book.take_read_failure()?;
        Ok(book.transactions.clone())
    }

    async fn list_player_transactions(
        &self,
        player_id: PlayerId,
    ) -> Result<Vec<Transaction>, ClientError> {
        let mut book = self.book();
        book.take_read_failure()?;
        Ok(book
            .transactions
            .iter()
            .filter(|tx| tx.involves(player_id))
            .cloned()
            .collect())
    }

    async fn send(&self, from: PlayerId, to: PlayerId, amount: Decimal) -> Result<(), ClientError> {
        self.book().mutation_calls += 1;
        self.send_money(from, to, amount)
    }

    async fn grant(&self, player_id: PlayerId, amount: Decimal) -> Result<(), ClientError> {
        let mut book = self.book();
        book.mutation_calls += 1;
        book.player_mut(player_id)?.balance += amount;
        book.record(Counterparty::System, player_id, amount);
        Ok(())
    }
}

#[derive(Default)]
struct AuthBook {
    issued: usize,
    used: Vec<String>,
    taken: HashSet<String>,
    offline: bool,
    pokes: usize,
    superuser_token: Option<String>,
}

// Session backend double: issues numbered codes and enforces unique names.
#[derive(Clone, Default)]
pub(crate) struct RecordingAuth {
    book: Arc<Mutex<AuthBook>>,
}

impl RecordingAuth {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn book(&self) -> std::sync::MutexGuard<'_, AuthBook> {
        self.book.lock().expect("auth mutex poisoned")
    }

    pub(crate) fn with_superuser_token(self, token: &str) -> Self {
        self.book().superuser_token = Some(token.to_string());
        self
    }

    pub(crate) fn take_name(&self, name: &str) {
        self.book().taken.insert(name.to_string());
    }

    pub(crate) fn set_offline(&self, offline: bool) {
        self.book().offline = offline;
    }

    pub(crate) fn codes_issued(&self) -> usize {
        self.book().issued
    }

    pub(crate) fn codes_used(&self) -> Vec<String> {
        self.book().used.clone()
    }

    pub(crate) fn pokes(&self) -> usize {
        self.book().pokes
    }
}

#[async_trait]
impl AuthGateway for RecordingAuth {
    async fn get_join_code(&self) -> Result<JoinCode, ClientError> {
        let mut book = self.book();
        if book.offline {
            return Err(ClientError::Auth(
                "could not obtain join code: connection refused".to_string(),
            ));
        }
        book.issued += 1;
        Ok(JoinCode(format!("CODE-{}", book.issued)))
    }

    async fn join(&self, req: JoinRequest) -> Result<Session, ClientError> {
        let mut book = self.book();
        if book.offline {
            return Err(ClientError::Auth("join failed: connection refused".to_string()));
        }
        if book.used.iter().any(|code| code == req.code.as_str()) {
            return Err(ClientError::Validation("Join code expired".to_string()));
        }
        book.used.push(req.code.as_str().to_string());
        if book.taken.contains(&req.player_name) {
            return Err(ClientError::Validation(
                "Player name already taken".to_string(),
            ));
        }
        if req.role == Role::GameMaster {
            if let Some(expected) = &book.superuser_token {
                if req.superuser_token.as_deref() != Some(expected.as_str()) {
                    return Err(ClientError::Validation(
                        "Invalid superuser token".to_string(),
                    ));
                }
            }
        }
        book.taken.insert(req.player_name.clone());
        Ok(Session {
            player_id: PlayerId::new(Uuid::new_v4()).expect("random uuid is not nil"),
            player_name: req.player_name,
            role: req.role,
        })
    }

    async fn poke(&self, _player_id: PlayerId) -> Result<(), ClientError> {
        let mut book = self.book();
        book.pokes += 1;
        if book.offline {
            return Err(ClientError::Transport("connection refused".to_string()));
        }
        Ok(())
    }
}

// Each script entry is one connect attempt: the messages it delivers, or a refusal.
type Script = Result<Vec<&'static str>, &'static str>;

struct HubBook {
    scripts: VecDeque<Script>,
    connects: usize,
    hold_last: bool,
}

// Push transport that replays scripted connections and drops each one when it runs dry.
#[derive(Clone)]
pub(crate) struct ScriptedHub {
    book: Arc<Mutex<HubBook>>,
}

impl ScriptedHub {
    pub(crate) fn new(scripts: Vec<Script>) -> Self {
        Self {
            book: Arc::new(Mutex::new(HubBook {
                scripts: scripts.into(),
                connects: 0,
                hold_last: false,
            })),
        }
    }

    // Keep the final scripted connection open once its messages are delivered.
    pub(crate) fn hold_last_connection(self) -> Self {
        self.book.lock().expect("hub mutex poisoned").hold_last = true;
        self
    }

    pub(crate) fn connects(&self) -> usize {
        self.book.lock().expect("hub mutex poisoned").connects
    }
}

#[async_trait]
impl HubTransport for ScriptedHub {
    async fn connect(&self) -> Result<Box<dyn HubConnection>, ClientError> {
        let mut book = self.book.lock().expect("hub mutex poisoned");
        book.connects += 1;
        match book.scripts.pop_front() {
            Some(Ok(messages)) => Ok(Box::new(ScriptedConnection {
                messages: messages.into_iter().map(str::to_string).collect(),
                hold: book.hold_last && book.scripts.is_empty(),
            })),
            Some(Err(reason)) => Err(ClientError::Transport(reason.to_string())),
            None => Err(ClientError::Transport(
                "no scripted connections left".to_string(),
            )),
        }
    }
}

struct ScriptedConnection {
    messages: VecDeque<String>,
    hold: bool,
}

#[async_trait]
impl HubConnection for ScriptedConnection {
    async fn next_message(&mut self) -> Result<Option<String>, ClientError> {
        if let Some(message) = self.messages.pop_front() {
            return Ok(Some(message));
        }
        if self.hold {
            std::future::pending::<()>().await;
        }
        Err(ClientError::Transport("scripted connection dropped".to_string()))
    }
}

// Retries immediately, `0` times at most.
pub(crate) struct ZeroDelayPolicy(pub(crate) u32);

impl ReconnectPolicy for ZeroDelayPolicy {
    fn next_delay(&self, attempt: u32) -> Option<Duration> {
        (attempt < self.0).then_some(Duration::ZERO)
    }
}
