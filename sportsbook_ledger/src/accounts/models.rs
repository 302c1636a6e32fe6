//! Account data models.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::{LedgerError, LedgerResult};
use crate::money;

/// Account ID type (the chat user id)
pub type AccountId = i64;

/// Account model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub display_name: String,
    pub balance: Decimal,
    pub active: bool,
    pub is_admin: bool,
    /// Optimistic write stamp, bumped by the store on every committed write
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Fresh account with a zero balance.
    pub fn new(id: AccountId, display_name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            display_name: display_name.into(),
            balance: money::to_money(Decimal::ZERO),
            active: true,
            is_admin: false,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Add funds to a locked account; returns the new balance.
    pub(crate) fn credit(&mut self, amount: Decimal) -> LedgerResult<Decimal> {
        self.ensure_movable(amount)?;
        self.add(amount)
    }

    /// Pay out funds the ledger already owes the holder (winnings, refunds).
    ///
    /// Unlike [`credit`](Self::credit) this also reaches deactivated
    /// accounts, so a pending bet can always be settled or cancelled.
    pub(crate) fn credit_owed(&mut self, amount: Decimal) -> LedgerResult<Decimal> {
        ensure_positive(amount)?;
        self.add(amount)
    }

    fn add(&mut self, amount: Decimal) -> LedgerResult<Decimal> {
        self.balance = self
            .balance
            .checked_add(amount)
            .map(money::to_money)
            .ok_or_else(|| LedgerError::InvalidAmount(format!("{amount} overflows balance")))?;
        self.updated_at = Utc::now();
        Ok(self.balance)
    }

    /// Remove funds from a locked account; returns the new balance.
    ///
    /// The caller holds the account lock, so the balance check and the
    /// decrement cannot interleave with another writer.
    pub(crate) fn debit(&mut self, amount: Decimal) -> LedgerResult<Decimal> {
        self.ensure_movable(amount)?;

        if self.balance < amount {
            return Err(LedgerError::InsufficientFunds {
                account_id: self.id,
                available: self.balance,
                required: amount,
            });
        }

        self.balance = money::to_money(self.balance - amount);
        self.updated_at = Utc::now();
        Ok(self.balance)
    }

    fn ensure_movable(&self, amount: Decimal) -> LedgerResult<()> {
        ensure_positive(amount)?;
        if !self.active {
            return Err(LedgerError::AccountInactive(self.id));
        }
        Ok(())
    }
}

fn ensure_positive(amount: Decimal) -> LedgerResult<()> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::InvalidAmount(format!(
            "{amount} (must be positive)"
        )));
    }
    Ok(())
}
