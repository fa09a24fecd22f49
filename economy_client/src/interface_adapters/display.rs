// Presentation helpers shared by the dashboards. Nothing here talks to the backend.

use crate::domain::{Counterparty, LiveEvent, Player, Transaction};
use rust_decimal::{Decimal, RoundingStrategy};
use std::cmp::Ordering;
use std::collections::HashMap;

// Deterministic display order: name (or id) ignoring case, then exact text, then id.
pub fn sort_players(players: &mut [Player]) {
    players.sort_by(compare_players);
}

fn compare_players(a: &Player, b: &Player) -> Ordering {
    let (a_label, b_label) = (a.display_name(), b.display_name());
    a_label
        .to_lowercase()
        .cmp(&b_label.to_lowercase())
        .then_with(|| a_label.cmp(&b_label))
        .then_with(|| a.id.cmp(&b.id))
}

pub fn format_amount(amount: Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    format!("${rounded:.2}")
}

// Resolves ids to names using the latest player listing; falls back to the raw id.
pub struct NameBook {
    names: HashMap<String, String>,
}

impl NameBook {
    pub fn new(players: &[Player]) -> Self {
        Self {
            names: players
                .iter()
                .map(|player| (player.id.to_string(), player.display_name()))
                .collect(),
        }
    }

    pub fn label(&self, party: &Counterparty) -> String {
        let key = party.to_string();
        self.names.get(&key).cloned().unwrap_or(key)
    }
}

pub fn transaction_row(tx: &Transaction, names: &NameBook) -> String {
    let mut row = format!(
        "{} {} -> {}: {}",
        tx.timestamp.format("%Y-%m-%d %H:%M:%S"),
        names.label(&tx.from_player_id),
        names.label(&Counterparty::Player(tx.to_player_id)),
        format_amount(tx.amount)
    );
    if let Some(memo) = tx.memo.as_deref().filter(|memo| !memo.is_empty()) {
        row.push_str(" (");
        row.push_str(memo);
        row.push(')');
    }
    row
}

pub fn player_row(player: &Player) -> String {
    format!("{} - Balance: {}", player.display_name(), format_amount(player.balance))
}

pub fn event_row(event: &LiveEvent) -> String {
    format!("[{}] {}", event.timestamp.format("%H:%M:%S"), event.content)
}
