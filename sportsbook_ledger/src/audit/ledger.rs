//! Read side of the audit ledger.

use std::sync::Arc;

use super::models::{Transaction, TransactionId};
use crate::accounts::AccountId;
use crate::errors::{LedgerError, LedgerResult};
use crate::store::LedgerStore;

/// Audit ledger queries
#[derive(Clone)]
pub struct AuditLedger {
    store: Arc<dyn LedgerStore>,
    history_limit: i64,
}

impl AuditLedger {
    pub fn new(store: Arc<dyn LedgerStore>, history_limit: i64) -> Self {
        Self {
            store,
            history_limit,
        }
    }

    /// Latest entries of an account, newest first
    ///
    /// `limit` is capped at the configured history limit; zero or a negative
    /// limit yields an empty list.
    ///
    /// # Errors
    ///
    /// * `LedgerError::AccountNotFound` - unknown account
    pub async fn list_transactions(
        &self,
        account_id: AccountId,
        limit: i64,
    ) -> LedgerResult<Vec<Transaction>> {
        if self.store.find_account(account_id).await?.is_none() {
            return Err(LedgerError::AccountNotFound(account_id));
        }
        if limit <= 0 {
            return Ok(Vec::new());
        }
        self.store
            .transactions_for_account(account_id, limit.min(self.history_limit))
            .await
    }

    /// Single entry by id
    pub async fn get_transaction(&self, id: TransactionId) -> LedgerResult<Transaction> {
        self.store
            .find_transaction(id)
            .await?
            .ok_or(LedgerError::TransactionNotFound(id))
    }

    /// Deposit/withdrawal requests awaiting an administrator, oldest first
    pub async fn pending_requests(&self) -> LedgerResult<Vec<Transaction>> {
        self.store.pending_requests().await
    }
}
