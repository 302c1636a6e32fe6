//! Account lookups and administrative flags.

use std::sync::Arc;

use log::{debug, info};
use rust_decimal::Decimal;

use super::models::{Account, AccountId};
use crate::errors::{LedgerError, LedgerResult};
use crate::retry::RetryPolicy;
use crate::store::LedgerStore;

/// Account store
#[derive(Clone)]
pub struct AccountStore {
    store: Arc<dyn LedgerStore>,
    retry: RetryPolicy,
}

impl AccountStore {
    pub fn new(store: Arc<dyn LedgerStore>, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    /// Get or create the account for a user, refreshing its display name
    ///
    /// A blank name falls back to the numeric id.
    pub async fn open_account(&self, id: AccountId, display_name: &str) -> LedgerResult<Account> {
        let display_name = match display_name.trim() {
            "" => id.to_string(),
            name => name.to_string(),
        };
        debug!("open_account: id={id}");
        self.store.upsert_account(id, &display_name).await
    }

    /// Snapshot read of an account
    ///
    /// # Errors
    ///
    /// * `LedgerError::AccountNotFound` - unknown id
    pub async fn get_account(&self, id: AccountId) -> LedgerResult<Account> {
        self.store
            .find_account(id)
            .await?
            .ok_or(LedgerError::AccountNotFound(id))
    }

    /// Current balance (snapshot read, never blocks writers)
    pub async fn get_balance(&self, id: AccountId) -> LedgerResult<Decimal> {
        Ok(self.get_account(id).await?.balance)
    }

    /// Deactivate an account; its balance is kept but can no longer move
    pub async fn deactivate(&self, id: AccountId) -> LedgerResult<Account> {
        let account = self
            .retry
            .run("deactivate", || self.update_flags(id, |a| a.active = false))
            .await?;
        info!("Account {id} deactivated");
        Ok(account)
    }

    /// Grant or revoke administrator rights
    pub async fn set_admin(&self, id: AccountId, is_admin: bool) -> LedgerResult<Account> {
        let account = self
            .retry
            .run("set_admin", || self.update_flags(id, |a| a.is_admin = is_admin))
            .await?;
        info!("Account {id} admin={is_admin}");
        Ok(account)
    }

    async fn update_flags(
        &self,
        id: AccountId,
        change: impl Fn(&mut Account),
    ) -> LedgerResult<Account> {
        let mut tx = self.store.begin().await?;
        let mut account = tx
            .lock_accounts(&[id])
            .await?
            .pop()
            .ok_or(LedgerError::AccountNotFound(id))?;

        change(&mut account);
        tx.save_account(&account).await?;
        tx.commit().await?;

        account.version += 1;
        Ok(account)
    }
}
