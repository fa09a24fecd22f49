use rust_decimal::Decimal;

use crate::domain::entities::PlayerId;
use crate::domain::errors::ClientError;

// Amounts are currency with cent precision.
pub const MAX_FRACTION_DIGITS: u32 = 2;
pub const MAX_MEMO_CHARS: usize = 140;

/// Local limits applied to every send and grant before anything reaches the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferLimits {
    pub max_amount: Decimal,
}

impl Default for TransferLimits {
    fn default() -> Self {
        Self {
            max_amount: Decimal::from(1_000_000),
        }
    }
}

impl TransferLimits {
    pub fn check_amount(&self, amount: Decimal) -> Result<(), ClientError> {
        if amount <= Decimal::ZERO {
            return Err(ClientError::validation("amount must be greater than zero"));
        }
        if amount > self.max_amount {
            return Err(ClientError::validation(format!(
                "amount must not exceed {}",
                self.max_amount
            )));
        }
        // normalize() drops trailing zeros so 10.50 counts as two digits, 10.500 too.
        if amount.normalize().scale() > MAX_FRACTION_DIGITS {
            return Err(ClientError::validation(format!(
                "amount must have at most {MAX_FRACTION_DIGITS} decimal places"
            )));
        }
        Ok(())
    }

    pub fn check_send(
        &self,
        from: PlayerId,
        to: PlayerId,
        amount: Decimal,
        memo: Option<&str>,
    ) -> Result<(), ClientError> {
        if from == to {
            return Err(ClientError::validation("cannot send money to yourself"));
        }
        self.check_amount(amount)?;
        check_memo(memo)
    }
}

fn check_memo(memo: Option<&str>) -> Result<(), ClientError> {
    match memo {
        Some(memo) if memo.chars().count() > MAX_MEMO_CHARS => Err(ClientError::validation(
            format!("memo must be at most {MAX_MEMO_CHARS} characters"),
        )),
        _ => Ok(()),
    }
}
