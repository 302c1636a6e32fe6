//! Approval workflow.

use std::sync::Arc;

use log::{debug, info, warn};
use rust_decimal::Decimal;

use crate::accounts::AccountId;
use crate::audit::{
    NewTransaction, RequestKind, Resolution, Transaction, TransactionId, TransactionKind,
    TransactionStatus,
};
use crate::errors::{LedgerError, LedgerResult};
use crate::money::validate_amount;
use crate::retry::RetryPolicy;
use crate::store::LedgerStore;

/// Approval workflow
#[derive(Clone)]
pub struct ApprovalWorkflow {
    store: Arc<dyn LedgerStore>,
    retry: RetryPolicy,
}

impl ApprovalWorkflow {
    pub fn new(store: Arc<dyn LedgerStore>, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    /// Record a deposit or withdrawal request awaiting approval
    ///
    /// # Errors
    ///
    /// * `LedgerError::InvalidAmount`
    /// * `LedgerError::AccountNotFound` / `LedgerError::AccountInactive`
    pub async fn create_transaction_request(
        &self,
        account_id: AccountId,
        kind: RequestKind,
        amount: Decimal,
        proof_ref: Option<String>,
    ) -> LedgerResult<Transaction> {
        let amount = validate_amount(amount)?;
        debug!("create_transaction_request: account={account_id} kind={kind:?} amount={amount}");

        let request = self
            .retry
            .run("create_transaction_request", || {
                self.try_create_request(account_id, kind, amount, proof_ref.clone())
            })
            .await?;

        info!(
            "Request {} created: account={} kind={} amount={}",
            request.id, request.account_id, request.kind, amount
        );
        Ok(request)
    }

    async fn try_create_request(
        &self,
        account_id: AccountId,
        kind: RequestKind,
        amount: Decimal,
        proof_ref: Option<String>,
    ) -> LedgerResult<Transaction> {
        let mut tx = self.store.begin().await?;
        let account = tx
            .lock_accounts(&[account_id])
            .await?
            .pop()
            .ok_or(LedgerError::AccountNotFound(account_id))?;
        if !account.active {
            return Err(LedgerError::AccountInactive(account_id));
        }

        let request = tx
            .append(&NewTransaction::request(account_id, kind, amount, proof_ref))
            .await?;
        tx.commit().await?;
        Ok(request)
    }

    /// Approve a pending request and apply it to the balance
    ///
    /// # Errors
    ///
    /// * `LedgerError::NotAdmin` - `admin_id` is not an active administrator
    /// * `LedgerError::TransactionNotFound`
    /// * `LedgerError::InvalidStateTransition` - request already resolved
    /// * `LedgerError::InsufficientFunds` - withdrawal exceeds the balance
    /// * `LedgerError::AccountInactive` - the account was deactivated after the request
    ///
    /// When the balance effect fails the request is committed as `Rejected`
    /// with the reason before the error is returned.
    pub async fn approve(
        &self,
        transaction_id: TransactionId,
        admin_id: AccountId,
    ) -> LedgerResult<Transaction> {
        self.ensure_admin(admin_id).await?;
        debug!("approve: transaction={transaction_id} admin={admin_id}");

        let result = self
            .retry
            .run("approve", || self.try_approve(transaction_id, admin_id))
            .await;

        match &result {
            Ok(approved) => info!(
                "Request {} approved by {}: balance_after={:?}",
                approved.id, admin_id, approved.balance_after
            ),
            Err(
                err @ (LedgerError::InsufficientFunds { .. }
                | LedgerError::AccountInactive(_)
                | LedgerError::InvalidAmount(_)),
            ) => {
                warn!("Request {transaction_id} rejected on approval: {err}")
            }
            Err(_) => {}
        }
        result
    }

    async fn try_approve(
        &self,
        transaction_id: TransactionId,
        admin_id: AccountId,
    ) -> LedgerResult<Transaction> {
        let mut tx = self.store.begin().await?;

        let request = tx.lock_transaction(transaction_id).await?;
        if request.status != TransactionStatus::Pending {
            return Err(LedgerError::invalid_transition(
                "transaction",
                request.status,
                TransactionStatus::Completed,
            ));
        }

        let mut account = tx
            .lock_accounts(&[request.account_id])
            .await?
            .pop()
            .ok_or(LedgerError::AccountNotFound(request.account_id))?;

        let applied = match request.kind {
            TransactionKind::Deposit => account.credit(request.magnitude()),
            TransactionKind::Withdrawal => account.debit(request.magnitude()),
            other => {
                return Err(LedgerError::Storage(format!(
                    "pending transaction {transaction_id} has kind {other}"
                )));
            }
        };

        // Any failure to apply the request is final: record it as rejected
        let balance_after = match applied {
            Ok(balance) => balance,
            Err(err) => {
                let reason = match &err {
                    LedgerError::InsufficientFunds {
                        available,
                        required,
                        ..
                    } => format!("Insufficient funds: available {available}, required {required}"),
                    other => other.to_string(),
                };
                tx.resolve(
                    transaction_id,
                    &Resolution {
                        status: TransactionStatus::Rejected,
                        admin_id,
                        balance_after: None,
                        description: Some(reason),
                    },
                )
                .await?;
                tx.commit().await?;
                return Err(err);
            }
        };

        tx.save_account(&account).await?;
        let approved = tx
            .resolve(
                transaction_id,
                &Resolution {
                    status: TransactionStatus::Completed,
                    admin_id,
                    balance_after: Some(balance_after),
                    description: None,
                },
            )
            .await?;
        tx.commit().await?;
        Ok(approved)
    }

    /// Reject a pending request without touching the balance
    pub async fn reject(
        &self,
        transaction_id: TransactionId,
        admin_id: AccountId,
    ) -> LedgerResult<Transaction> {
        self.ensure_admin(admin_id).await?;
        debug!("reject: transaction={transaction_id} admin={admin_id}");

        let rejected = self
            .retry
            .run("reject", || self.try_reject(transaction_id, admin_id))
            .await?;
        info!("Request {transaction_id} rejected by {admin_id}");
        Ok(rejected)
    }

    async fn try_reject(
        &self,
        transaction_id: TransactionId,
        admin_id: AccountId,
    ) -> LedgerResult<Transaction> {
        let mut tx = self.store.begin().await?;

        let request = tx.lock_transaction(transaction_id).await?;
        if request.status != TransactionStatus::Pending {
            return Err(LedgerError::invalid_transition(
                "transaction",
                request.status,
                TransactionStatus::Rejected,
            ));
        }

        let rejected = tx
            .resolve(
                transaction_id,
                &Resolution {
                    status: TransactionStatus::Rejected,
                    admin_id,
                    balance_after: None,
                    description: None,
                },
            )
            .await?;
        tx.commit().await?;
        Ok(rejected)
    }

    /// Requests awaiting a decision, oldest first
    pub async fn pending_requests(&self) -> LedgerResult<Vec<Transaction>> {
        self.store.pending_requests().await
    }

    async fn ensure_admin(&self, admin_id: AccountId) -> LedgerResult<()> {
        match self.store.find_account(admin_id).await? {
            Some(admin) if admin.is_admin && admin.active => Ok(()),
            _ => Err(LedgerError::NotAdmin(admin_id)),
        }
    }
}
