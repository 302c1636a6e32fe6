//! Transfer service.

use std::sync::Arc;

use log::{debug, info};
use rust_decimal::Decimal;

use super::models::{NewTransfer, Transfer, TransferDirection};
use crate::accounts::AccountId;
use crate::audit::{NewTransaction, TransactionKind};
use crate::errors::{LedgerError, LedgerResult};
use crate::money::validate_amount;
use crate::retry::RetryPolicy;
use crate::store::LedgerStore;

/// Transfer service
#[derive(Clone)]
pub struct TransferService {
    store: Arc<dyn LedgerStore>,
    retry: RetryPolicy,
    history_limit: i64,
}

impl TransferService {
    pub fn new(store: Arc<dyn LedgerStore>, retry: RetryPolicy, history_limit: i64) -> Self {
        Self {
            store,
            retry,
            history_limit,
        }
    }

    /// Move funds between two accounts
    ///
    /// Debits the sender, credits the receiver, records the transfer and
    /// appends a `TransferOut`/`TransferIn` pair that both reference it.
    /// Either all of that commits or none of it does.
    ///
    /// # Errors
    ///
    /// * `LedgerError::InvalidAmount`
    /// * `LedgerError::SelfTransfer` - checked before any I/O
    /// * `LedgerError::AccountNotFound` - either side unknown
    /// * `LedgerError::AccountInactive` - either side deactivated
    /// * `LedgerError::InsufficientFunds` - sender balance below `amount`
    pub async fn transfer(
        &self,
        sender_id: AccountId,
        receiver_id: AccountId,
        amount: Decimal,
    ) -> LedgerResult<Transfer> {
        let amount = validate_amount(amount)?;
        if sender_id == receiver_id {
            return Err(LedgerError::SelfTransfer);
        }
        debug!("transfer: {sender_id} -> {receiver_id} amount={amount}");

        let transfer = self
            .retry
            .run("transfer", || self.try_transfer(sender_id, receiver_id, amount))
            .await?;

        info!(
            "Transfer {}: {} -> {} amount={}",
            transfer.id, transfer.sender_id, transfer.receiver_id, transfer.amount
        );
        Ok(transfer)
    }

    async fn try_transfer(
        &self,
        sender_id: AccountId,
        receiver_id: AccountId,
        amount: Decimal,
    ) -> LedgerResult<Transfer> {
        let mut tx = self.store.begin().await?;

        // Locked lowest id first, whichever side is sending
        let locked = tx.lock_accounts(&[sender_id, receiver_id]).await?;
        let (mut sender, mut receiver) = match locked.as_slice() {
            [a, b] if a.id == sender_id => (a.clone(), b.clone()),
            [a, b] => (b.clone(), a.clone()),
            _ => {
                return Err(LedgerError::Storage(format!(
                    "expected two locked accounts, got {}",
                    locked.len()
                )));
            }
        };

        if !receiver.active {
            return Err(LedgerError::AccountInactive(receiver_id));
        }
        sender.debit(amount)?;
        receiver.credit(amount)?;
        tx.save_account(&sender).await?;
        tx.save_account(&receiver).await?;

        let transfer = tx
            .insert_transfer(&NewTransfer {
                sender_id,
                receiver_id,
                amount,
            })
            .await?;

        tx.append(&NewTransaction::completed(
            &sender,
            TransactionKind::TransferOut,
            amount,
            Some(transfer.id),
            format!("Transfer to {}", receiver.display_name),
        ))
        .await?;
        tx.append(&NewTransaction::completed(
            &receiver,
            TransactionKind::TransferIn,
            amount,
            Some(transfer.id),
            format!("Transfer from {}", sender.display_name),
        ))
        .await?;

        tx.commit().await?;
        Ok(transfer)
    }

    /// Transfers involving an account, newest first
    ///
    /// `limit` is capped at the configured history limit; zero or a negative
    /// limit yields an empty list.
    pub async fn list_transfers(
        &self,
        account_id: AccountId,
        direction: TransferDirection,
        limit: i64,
    ) -> LedgerResult<Vec<Transfer>> {
        if self.store.find_account(account_id).await?.is_none() {
            return Err(LedgerError::AccountNotFound(account_id));
        }
        if limit <= 0 {
            return Ok(Vec::new());
        }
        self.store
            .transfers_for_account(account_id, direction, limit.min(self.history_limit))
            .await
    }
}
