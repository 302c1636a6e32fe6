//! Ledger facade bundling every service over one store.

use std::sync::Arc;

use rust_decimal::Decimal;

use crate::accounts::{AccountId, AccountStore};
use crate::approvals::ApprovalWorkflow;
use crate::audit::{AuditLedger, RequestKind, Transaction, TransactionId};
use crate::betting::{Bet, BetEngine, BetId, BetOutcome, BetStatus};
use crate::config::LedgerConfig;
use crate::db::Database;
use crate::errors::LedgerResult;
use crate::markets::{MarketCatalog, OptionId};
use crate::retry::RetryPolicy;
use crate::store::{LedgerStore, MemoryLedgerStore, PgLedgerStore};
use crate::transfers::{Transfer, TransferService};

/// Account ledger engine
///
/// Cheap to clone; every clone shares the same store.
///
/// ```
/// use rust_decimal_macros::dec;
/// use sportsbook_ledger::{Ledger, LedgerConfig, LedgerError};
///
/// # #[tokio::main]
/// # async fn main() {
/// let ledger = Ledger::in_memory(&LedgerConfig::default());
/// ledger.accounts().open_account(1, "Ana").await.unwrap();
/// ledger.accounts().open_account(2, "Bruno").await.unwrap();
///
/// let err = ledger.transfer(1, 2, dec!(5.00)).await.unwrap_err();
/// assert!(matches!(err, LedgerError::InsufficientFunds { .. }));
/// # }
/// ```
#[derive(Clone)]
pub struct Ledger {
    store: Arc<dyn LedgerStore>,
    accounts: AccountStore,
    audit: AuditLedger,
    markets: MarketCatalog,
    bets: BetEngine,
    transfers: TransferService,
    approvals: ApprovalWorkflow,
}

impl Ledger {
    /// Wire every service over `store`
    pub fn new(store: Arc<dyn LedgerStore>, config: &LedgerConfig) -> Self {
        let retry = RetryPolicy::from_config(config);
        Self {
            accounts: AccountStore::new(store.clone(), retry),
            audit: AuditLedger::new(store.clone(), config.history_limit),
            markets: MarketCatalog::new(store.clone(), retry, config.history_limit),
            bets: BetEngine::new(store.clone(), retry),
            transfers: TransferService::new(store.clone(), retry, config.history_limit),
            approvals: ApprovalWorkflow::new(store.clone(), retry),
            store,
        }
    }

    /// Ledger over a fresh in-process store
    pub fn in_memory(config: &LedgerConfig) -> Self {
        let store = MemoryLedgerStore::with_lock_timeout(config.lock_timeout);
        Self::new(Arc::new(store), config)
    }

    /// Ledger over PostgreSQL; the schema must already be migrated
    pub fn connect(db: &Database, config: &LedgerConfig) -> Self {
        let store = PgLedgerStore::new(db.shared_pool(), config.lock_timeout);
        Self::new(Arc::new(store), config)
    }

    pub fn accounts(&self) -> &AccountStore {
        &self.accounts
    }

    pub fn audit(&self) -> &AuditLedger {
        &self.audit
    }

    pub fn markets(&self) -> &MarketCatalog {
        &self.markets
    }

    pub fn bets(&self) -> &BetEngine {
        &self.bets
    }

    pub fn transfers(&self) -> &TransferService {
        &self.transfers
    }

    pub fn approvals(&self) -> &ApprovalWorkflow {
        &self.approvals
    }

    /// Liveness probe of the underlying store
    pub async fn ping(&self) -> LedgerResult<()> {
        self.store.ping().await
    }

    pub async fn get_balance(&self, account_id: AccountId) -> LedgerResult<Decimal> {
        self.accounts.get_balance(account_id).await
    }

    pub async fn place_bet(
        &self,
        account_id: AccountId,
        option_id: OptionId,
        amount: Decimal,
    ) -> LedgerResult<Bet> {
        self.bets.place_bet(account_id, option_id, amount).await
    }

    pub async fn settle_bet(&self, bet_id: BetId, outcome: BetOutcome) -> LedgerResult<Bet> {
        self.bets.settle_bet(bet_id, outcome).await
    }

    pub async fn cancel_bet(&self, bet_id: BetId) -> LedgerResult<Bet> {
        self.bets.cancel_bet(bet_id).await
    }

    pub async fn transfer(
        &self,
        sender_id: AccountId,
        receiver_id: AccountId,
        amount: Decimal,
    ) -> LedgerResult<Transfer> {
        self.transfers.transfer(sender_id, receiver_id, amount).await
    }

    pub async fn create_transaction_request(
        &self,
        account_id: AccountId,
        kind: RequestKind,
        amount: Decimal,
        proof_ref: Option<String>,
    ) -> LedgerResult<Transaction> {
        self.approvals
            .create_transaction_request(account_id, kind, amount, proof_ref)
            .await
    }

    pub async fn approve_transaction(
        &self,
        transaction_id: TransactionId,
        admin_id: AccountId,
    ) -> LedgerResult<Transaction> {
        self.approvals.approve(transaction_id, admin_id).await
    }

    pub async fn reject_transaction(
        &self,
        transaction_id: TransactionId,
        admin_id: AccountId,
    ) -> LedgerResult<Transaction> {
        self.approvals.reject(transaction_id, admin_id).await
    }

    pub async fn list_bets_by_status(
        &self,
        account_id: AccountId,
        status: Option<BetStatus>,
    ) -> LedgerResult<Vec<Bet>> {
        self.bets.list_bets_by_status(account_id, status).await
    }

    pub async fn list_transactions(
        &self,
        account_id: AccountId,
        limit: i64,
    ) -> LedgerResult<Vec<Transaction>> {
        self.audit.list_transactions(account_id, limit).await
    }
}
