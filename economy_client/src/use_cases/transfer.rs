// Sends and grants. Local checks run before the gateway is touched; on success the
// affected listings are invalidated so callers re-fetch.

use crate::domain::{ClientError, LedgerGateway, PlayerId, Session, TransferLimits};
use crate::use_cases::queries::{SharedCache, lock};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
pub struct TransferClient {
    ledger: Arc<dyn LedgerGateway>,
    cache: SharedCache,
    limits: TransferLimits,
}

impl TransferClient {
    pub fn new(ledger: Arc<dyn LedgerGateway>, cache: SharedCache, limits: TransferLimits) -> Self {
        Self {
            ledger,
            cache,
            limits,
        }
    }

    pub fn limits(&self) -> TransferLimits {
        self.limits
    }

    // The backend decides whether the sender can afford it; we never guess.
    #[tracing::instrument(
        name = "send_money",
        skip_all,
        fields(%from, %to, %amount, memo = memo.unwrap_or_default())
    )]
    pub async fn send(
        &self,
        from: PlayerId,
        to: PlayerId,
        amount: Decimal,
        memo: Option<&str>,
    ) -> Result<(), ClientError> {
        self.limits.check_send(from, to, amount, memo)?;

        self.ledger.send(from, to, amount).await.inspect_err(|e| {
            warn!(error = %e, hint = ?e.hint(), "transfer rejected");
        })?;

        lock(&self.cache).invalidate(&[from, to]);
        info!("transfer accepted");
        Ok(())
    }

    // Role gating here is a convenience; the backend still has the final word.
    #[tracing::instrument(
        name = "grant_money",
        skip_all,
        fields(%player_id, %amount, role = %session.role)
    )]
    pub async fn grant(
        &self,
        session: &Session,
        player_id: PlayerId,
        amount: Decimal,
    ) -> Result<(), ClientError> {
        if !session.role.can_grant() {
            return Err(ClientError::validation(
                "only the game master can grant money",
            ));
        }
        self.limits.check_amount(amount)?;

        self.ledger
            .grant(player_id, amount)
            .await
            .inspect_err(|e| warn!(error = %e, "grant rejected"))?;

        lock(&self.cache).invalidate(&[player_id]);
        info!("grant accepted");
        Ok(())
    }
}
