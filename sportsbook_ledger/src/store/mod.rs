//! Storage backends for the ledger.
//!
//! All writes go through a [`LedgerTx`] unit of work obtained from
//! [`LedgerStore::begin`]. A unit of work:
//!
//! - holds an exclusive lock on every account it touched until it ends
//! - waits a bounded time for a lock and fails with
//!   `LedgerError::ConcurrencyConflict` when the wait expires
//! - becomes visible only on [`LedgerTx::commit`]; dropping it without a
//!   commit discards every staged write
//!
//! Two backends implement the traits:
//!
//! - [`PgLedgerStore`]: PostgreSQL with `SELECT ... FOR UPDATE` row locks
//! - [`MemoryLedgerStore`]: in-process tables guarded by one async mutex per
//!   account, for tests and embedding

use async_trait::async_trait;

use crate::accounts::{Account, AccountId};
use crate::audit::{NewTransaction, Resolution, Transaction, TransactionId};
use crate::betting::{Bet, BetId, BetStatus, NewBet};
use crate::errors::LedgerResult;
use crate::markets::{BetOption, Match, MatchId, MatchStatus, NewBetOption, NewMatch, OptionId};
use crate::transfers::{NewTransfer, Transfer, TransferDirection, TransferId};

pub mod memory;
pub mod postgres;

pub use memory::MemoryLedgerStore;
pub use postgres::PgLedgerStore;

/// Authoritative store: snapshot reads, catalog writes, and units of work
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Start a unit of work
    async fn begin(&self) -> LedgerResult<Box<dyn LedgerTx>>;

    /// Cheap liveness probe
    async fn ping(&self) -> LedgerResult<()>;

    /// Insert the account if absent, otherwise refresh its display name
    async fn upsert_account(&self, id: AccountId, display_name: &str) -> LedgerResult<Account>;

    /// Snapshot read of an account
    async fn find_account(&self, id: AccountId) -> LedgerResult<Option<Account>>;

    /// Create a match
    async fn insert_match(&self, new: &NewMatch) -> LedgerResult<Match>;

    /// Find a match
    async fn find_match(&self, id: MatchId) -> LedgerResult<Option<Match>>;

    /// Scheduled matches that have not started yet, soonest first
    async fn upcoming_matches(&self, limit: i64) -> LedgerResult<Vec<Match>>;

    /// Change match status; leaving `Scheduled` deactivates every option of the match
    async fn update_match_status(
        &self,
        id: MatchId,
        status: MatchStatus,
        result: Option<&str>,
    ) -> LedgerResult<Match>;

    /// Create a bet option
    async fn insert_option(&self, new: &NewBetOption) -> LedgerResult<BetOption>;

    /// Find a bet option
    async fn find_option(&self, id: OptionId) -> LedgerResult<Option<BetOption>>;

    /// Options of a match, ordered by id
    async fn options_for_match(
        &self,
        match_id: MatchId,
        active_only: bool,
    ) -> LedgerResult<Vec<BetOption>>;

    /// Open or close an option for betting
    async fn set_option_active(&self, id: OptionId, active: bool) -> LedgerResult<BetOption>;

    /// Find a bet
    async fn find_bet(&self, id: BetId) -> LedgerResult<Option<Bet>>;

    /// Bets of an account, newest first
    async fn bets_for_account(
        &self,
        account_id: AccountId,
        status: Option<BetStatus>,
    ) -> LedgerResult<Vec<Bet>>;

    /// Ids of the pending bets on an option, oldest first
    async fn pending_bets_for_option(&self, option_id: OptionId) -> LedgerResult<Vec<BetId>>;

    /// Find a transaction
    async fn find_transaction(&self, id: TransactionId) -> LedgerResult<Option<Transaction>>;

    /// Transactions of an account, newest first
    async fn transactions_for_account(
        &self,
        account_id: AccountId,
        limit: i64,
    ) -> LedgerResult<Vec<Transaction>>;

    /// Pending deposit/withdrawal requests, oldest first
    async fn pending_requests(&self) -> LedgerResult<Vec<Transaction>>;

    /// Find a transfer
    async fn find_transfer(&self, id: TransferId) -> LedgerResult<Option<Transfer>>;

    /// Transfers involving an account, newest first
    async fn transfers_for_account(
        &self,
        account_id: AccountId,
        direction: TransferDirection,
        limit: i64,
    ) -> LedgerResult<Vec<Transfer>>;
}

/// One atomic unit of work
#[async_trait]
pub trait LedgerTx: Send {
    /// Lock accounts in ascending id order and return them in that order
    ///
    /// Fails with `AccountNotFound` for an unknown id.
    async fn lock_accounts(&mut self, ids: &[AccountId]) -> LedgerResult<Vec<Account>>;

    /// Persist balance and flags of a locked account
    ///
    /// `account.version` is the version read under the lock; a mismatch at
    /// write time aborts with `ConcurrencyConflict`.
    async fn save_account(&mut self, account: &Account) -> LedgerResult<()>;

    /// Read an option and its match
    ///
    /// A bet inserted in the same unit of work must not commit once the
    /// option has been closed concurrently: PostgreSQL holds both rows with
    /// `FOR SHARE`, the in-process store re-checks them at commit and fails
    /// with `OptionInactive`.
    async fn read_option(&mut self, id: OptionId) -> LedgerResult<(BetOption, Match)>;

    /// Insert a pending bet
    async fn insert_bet(&mut self, new: &NewBet) -> LedgerResult<Bet>;

    /// Lock a bet row
    async fn lock_bet(&mut self, id: BetId) -> LedgerResult<Bet>;

    /// Move a locked pending bet to a terminal status
    async fn close_bet(&mut self, id: BetId, status: BetStatus) -> LedgerResult<Bet>;

    /// Append an audit entry
    async fn append(&mut self, entry: &NewTransaction) -> LedgerResult<Transaction>;

    /// Lock a transaction row
    async fn lock_transaction(&mut self, id: TransactionId) -> LedgerResult<Transaction>;

    /// Resolve a locked pending request
    async fn resolve(
        &mut self,
        id: TransactionId,
        resolution: &Resolution,
    ) -> LedgerResult<Transaction>;

    /// Insert a transfer summary row
    async fn insert_transfer(&mut self, new: &NewTransfer) -> LedgerResult<Transfer>;

    /// Make every staged write visible and release the locks
    async fn commit(&mut self) -> LedgerResult<()>;
}

/// Sort and dedup ids so every unit of work locks in the same global order.
pub(crate) fn lock_order(ids: &[AccountId]) -> Vec<AccountId> {
    let mut ordered = ids.to_vec();
    ordered.sort_unstable();
    ordered.dedup();
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_order_is_ascending_and_unique() {
        assert_eq!(lock_order(&[9, 3, 9, 1]), vec![1, 3, 9]);
        assert_eq!(lock_order(&[2, 1]), lock_order(&[1, 2]));
        assert!(lock_order(&[]).is_empty());
    }
}
