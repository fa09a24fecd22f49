// Ledger reads plus the listing cache that mutations invalidate.

use crate::domain::{ClientError, LedgerGateway, Player, PlayerId, Transaction};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Last fetched listings. Entries are dropped whenever a mutation touches them.
#[derive(Debug, Default)]
pub struct ListingCache {
    players: Option<Vec<Player>>,
    transactions: Option<Vec<Transaction>>,
    player_transactions: HashMap<PlayerId, Vec<Transaction>>,
    // Bumped by every invalidation. A read only stores its result if no mutation landed
    // while it was in flight.
    generation: u64,
}

impl ListingCache {
    // Balances and global history change with any mutation; per-player history only for
    // the players involved.
    pub fn invalidate(&mut self, affected: &[PlayerId]) {
        self.generation += 1;
        self.players = None;
        self.transactions = None;
        for player in affected {
            self.player_transactions.remove(player);
        }
    }
}

pub type SharedCache = Arc<Mutex<ListingCache>>;

pub(crate) fn lock(cache: &SharedCache) -> MutexGuard<'_, ListingCache> {
    cache.lock().unwrap_or_else(PoisonError::into_inner)
}

// Most recent first; id breaks timestamp ties so repeated reads list identically.
pub fn sort_newest_first(transactions: &mut [Transaction]) {
    transactions.sort_by(|a, b| {
        b.timestamp
            .cmp(&a.timestamp)
            .then_with(|| b.id.cmp(&a.id))
    });
}

#[derive(Clone)]
pub struct LedgerQueries {
    ledger: Arc<dyn LedgerGateway>,
    cache: SharedCache,
}

impl LedgerQueries {
    pub fn new(ledger: Arc<dyn LedgerGateway>, cache: SharedCache) -> Self {
        Self { ledger, cache }
    }

    // Backend order is unspecified; callers sort for display.
    pub async fn list_players(&self) -> Result<Vec<Player>, ClientError> {
        let generation = lock(&self.cache).generation;
        let players = self.ledger.list_players().await?;
        let mut cache = lock(&self.cache);
        if cache.generation == generation {
            cache.players = Some(players.clone());
        } else {
            debug!("player listing raced a mutation; not cached");
        }
        Ok(players)
    }

    pub async fn get_player(&self, player_id: PlayerId) -> Result<Player, ClientError> {
        self.list_players()
            .await?
            .into_iter()
            .find(|player| player.id == player_id)
            .ok_or_else(|| ClientError::NotFound(format!("player {player_id} not found")))
    }

    pub async fn list_transactions(&self) -> Result<Vec<Transaction>, ClientError> {
        let generation = lock(&self.cache).generation;
        let mut transactions = self.ledger.list_transactions().await?;
        sort_newest_first(&mut transactions);
        let mut cache = lock(&self.cache);
        if cache.generation == generation {
            cache.transactions = Some(transactions.clone());
        }
        Ok(transactions)
    }

    pub async fn list_player_transactions(
        &self,
        player_id: PlayerId,
    ) -> Result<Vec<Transaction>, ClientError> {
        let generation = lock(&self.cache).generation;
        let fetched = self.ledger.list_player_transactions(player_id).await?;
        let total = fetched.len();
        let mut transactions: Vec<_> = fetched
            .into_iter()
            .filter(|tx| tx.involves(player_id))
            .collect();
        if transactions.len() != total {
            debug!(
                %player_id,
                dropped = total - transactions.len(),
                "backend returned transactions not involving the player"
            );
        }
        sort_newest_first(&mut transactions);
        let mut cache = lock(&self.cache);
        if cache.generation == generation {
            cache
                .player_transactions
                .insert(player_id, transactions.clone());
        }
        Ok(transactions)
    }

    pub fn cached_players(&self) -> Option<Vec<Player>> {
        lock(&self.cache).players.clone()
    }

    pub fn cached_transactions(&self) -> Option<Vec<Transaction>> {
        lock(&self.cache).transactions.clone()
    }

    pub fn cached_player_transactions(&self, player_id: PlayerId) -> Option<Vec<Transaction>> {
        lock(&self.cache).player_transactions.get(&player_id).cloned()
    }
}
