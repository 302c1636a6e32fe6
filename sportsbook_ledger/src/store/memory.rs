//! In-process ledger store.
//!
//! Committed state lives in one set of tables behind an `RwLock` that is only
//! held for short copy-in/copy-out sections. Serialisation of money movement
//! comes from a separate registry of per-account async mutexes: a unit of
//! work locks the accounts it touches (bets and transactions lock their
//! owning account), stages its writes privately and publishes them on
//! commit while still holding those locks.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use super::{LedgerStore, LedgerTx, lock_order};
use crate::accounts::{Account, AccountId};
use crate::audit::{NewTransaction, Resolution, Transaction, TransactionId, TransactionStatus};
use crate::betting::{Bet, BetId, BetStatus, NewBet};
use crate::errors::{LedgerError, LedgerResult};
use crate::markets::{BetOption, Match, MatchId, MatchStatus, NewBetOption, NewMatch, OptionId};
use crate::transfers::{NewTransfer, Transfer, TransferDirection, TransferId};

/// Default bound on how long a unit of work waits for an account lock
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Default)]
struct Tables {
    accounts: BTreeMap<AccountId, Account>,
    matches: BTreeMap<MatchId, Match>,
    options: BTreeMap<OptionId, BetOption>,
    bets: BTreeMap<BetId, Bet>,
    transactions: BTreeMap<TransactionId, Transaction>,
    transfers: BTreeMap<TransferId, Transfer>,
}

#[derive(Default)]
struct Sequences {
    matches: AtomicI64,
    options: AtomicI64,
    bets: AtomicI64,
    transactions: AtomicI64,
    transfers: AtomicI64,
}

fn next_id(sequence: &AtomicI64) -> i64 {
    sequence.fetch_add(1, Ordering::SeqCst) + 1
}

#[derive(Default)]
struct Shared {
    tables: RwLock<Tables>,
    account_locks: Mutex<HashMap<AccountId, Arc<Mutex<()>>>>,
    sequences: Sequences,
}

impl Shared {
    async fn account_lock(&self, id: AccountId) -> Arc<Mutex<()>> {
        let mut locks = self.account_locks.lock().await;
        locks.entry(id).or_default().clone()
    }
}

/// In-process ledger store
#[derive(Clone)]
pub struct MemoryLedgerStore {
    shared: Arc<Shared>,
    lock_timeout: Duration,
}

impl Default for MemoryLedgerStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLedgerStore {
    /// Create an empty store with the default lock timeout
    pub fn new() -> Self {
        Self::with_lock_timeout(DEFAULT_LOCK_TIMEOUT)
    }

    /// Create an empty store with a custom lock timeout
    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        Self {
            shared: Arc::new(Shared::default()),
            lock_timeout,
        }
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn begin(&self) -> LedgerResult<Box<dyn LedgerTx>> {
        Ok(Box::new(MemoryTx {
            shared: self.shared.clone(),
            lock_timeout: self.lock_timeout,
            guards: BTreeMap::new(),
            accounts: BTreeMap::new(),
            bets: BTreeMap::new(),
            transactions: BTreeMap::new(),
            transfers: Vec::new(),
            finished: false,
        }))
    }

    async fn ping(&self) -> LedgerResult<()> {
        Ok(())
    }

    async fn upsert_account(&self, id: AccountId, display_name: &str) -> LedgerResult<Account> {
        let mut tables = self.shared.tables.write().await;
        let account = tables
            .accounts
            .entry(id)
            .and_modify(|existing| {
                if existing.display_name != display_name {
                    existing.display_name = display_name.to_string();
                    existing.updated_at = Utc::now();
                }
            })
            .or_insert_with(|| Account::new(id, display_name));
        Ok(account.clone())
    }

    async fn find_account(&self, id: AccountId) -> LedgerResult<Option<Account>> {
        Ok(self.shared.tables.read().await.accounts.get(&id).cloned())
    }

    async fn insert_match(&self, new: &NewMatch) -> LedgerResult<Match> {
        let now = Utc::now();
        let fixture = Match {
            id: next_id(&self.shared.sequences.matches),
            home_team: new.home_team.clone(),
            away_team: new.away_team.clone(),
            starts_at: new.starts_at,
            status: MatchStatus::Scheduled,
            result: None,
            created_at: now,
            updated_at: now,
        };
        let mut tables = self.shared.tables.write().await;
        tables.matches.insert(fixture.id, fixture.clone());
        Ok(fixture)
    }

    async fn find_match(&self, id: MatchId) -> LedgerResult<Option<Match>> {
        Ok(self.shared.tables.read().await.matches.get(&id).cloned())
    }

    async fn upcoming_matches(&self, limit: i64) -> LedgerResult<Vec<Match>> {
        let now = Utc::now();
        let tables = self.shared.tables.read().await;
        let mut upcoming: Vec<Match> = tables
            .matches
            .values()
            .filter(|m| m.status == MatchStatus::Scheduled && m.starts_at > now)
            .cloned()
            .collect();
        upcoming.sort_by(|a, b| (a.starts_at, a.id).cmp(&(b.starts_at, b.id)));
        upcoming.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(upcoming)
    }

    async fn update_match_status(
        &self,
        id: MatchId,
        status: MatchStatus,
        result: Option<&str>,
    ) -> LedgerResult<Match> {
        let mut tables = self.shared.tables.write().await;
        let fixture = tables
            .matches
            .get_mut(&id)
            .ok_or(LedgerError::MatchNotFound(id))?;
        fixture.status = status;
        if let Some(result) = result {
            fixture.result = Some(result.to_string());
        }
        fixture.updated_at = Utc::now();
        let fixture = fixture.clone();

        if status != MatchStatus::Scheduled {
            for option in tables.options.values_mut().filter(|o| o.match_id == id) {
                option.active = false;
            }
        }
        Ok(fixture)
    }

    async fn insert_option(&self, new: &NewBetOption) -> LedgerResult<BetOption> {
        let mut tables = self.shared.tables.write().await;
        if !tables.matches.contains_key(&new.match_id) {
            return Err(LedgerError::MatchNotFound(new.match_id));
        }
        let option = BetOption {
            id: next_id(&self.shared.sequences.options),
            match_id: new.match_id,
            prediction: new.prediction.clone(),
            odds: new.odds,
            active: true,
        };
        tables.options.insert(option.id, option.clone());
        Ok(option)
    }

    async fn find_option(&self, id: OptionId) -> LedgerResult<Option<BetOption>> {
        Ok(self.shared.tables.read().await.options.get(&id).cloned())
    }

    async fn options_for_match(
        &self,
        match_id: MatchId,
        active_only: bool,
    ) -> LedgerResult<Vec<BetOption>> {
        let tables = self.shared.tables.read().await;
        Ok(tables
            .options
            .values()
            .filter(|o| o.match_id == match_id && (!active_only || o.active))
            .cloned()
            .collect())
    }

    async fn set_option_active(&self, id: OptionId, active: bool) -> LedgerResult<BetOption> {
        let mut tables = self.shared.tables.write().await;
        let option = tables
            .options
            .get_mut(&id)
            .ok_or(LedgerError::OptionNotFound(id))?;
        option.active = active;
        Ok(option.clone())
    }

    async fn find_bet(&self, id: BetId) -> LedgerResult<Option<Bet>> {
        Ok(self.shared.tables.read().await.bets.get(&id).cloned())
    }

    async fn bets_for_account(
        &self,
        account_id: AccountId,
        status: Option<BetStatus>,
    ) -> LedgerResult<Vec<Bet>> {
        let tables = self.shared.tables.read().await;
        let mut bets: Vec<Bet> = tables
            .bets
            .values()
            .filter(|b| b.account_id == account_id && status.is_none_or(|s| b.status == s))
            .cloned()
            .collect();
        bets.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(bets)
    }

    async fn pending_bets_for_option(&self, option_id: OptionId) -> LedgerResult<Vec<BetId>> {
        let tables = self.shared.tables.read().await;
        Ok(tables
            .bets
            .values()
            .filter(|b| b.option_id == option_id && b.status == BetStatus::Pending)
            .map(|b| b.id)
            .collect())
    }

    async fn find_transaction(&self, id: TransactionId) -> LedgerResult<Option<Transaction>> {
        Ok(self.shared.tables.read().await.transactions.get(&id).cloned())
    }

    async fn transactions_for_account(
        &self,
        account_id: AccountId,
        limit: i64,
    ) -> LedgerResult<Vec<Transaction>> {
        let tables = self.shared.tables.read().await;
        let mut entries: Vec<Transaction> = tables
            .transactions
            .values()
            .filter(|t| t.account_id == account_id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        entries.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(entries)
    }

    async fn pending_requests(&self) -> LedgerResult<Vec<Transaction>> {
        let tables = self.shared.tables.read().await;
        let mut pending: Vec<Transaction> = tables
            .transactions
            .values()
            .filter(|t| t.status == TransactionStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
        Ok(pending)
    }

    async fn find_transfer(&self, id: TransferId) -> LedgerResult<Option<Transfer>> {
        Ok(self.shared.tables.read().await.transfers.get(&id).cloned())
    }

    async fn transfers_for_account(
        &self,
        account_id: AccountId,
        direction: TransferDirection,
        limit: i64,
    ) -> LedgerResult<Vec<Transfer>> {
        let tables = self.shared.tables.read().await;
        let mut transfers: Vec<Transfer> = tables
            .transfers
            .values()
            .filter(|t| direction.matches(t, account_id))
            .cloned()
            .collect();
        transfers.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        transfers.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(transfers)
    }
}

/// Staged unit of work over [`MemoryLedgerStore`]
struct MemoryTx {
    shared: Arc<Shared>,
    lock_timeout: Duration,
    guards: BTreeMap<AccountId, OwnedMutexGuard<()>>,
    /// Locked accounts keyed by id, with the version read under the lock
    accounts: BTreeMap<AccountId, (Account, Option<Account>)>,
    bets: BTreeMap<BetId, Bet>,
    transactions: BTreeMap<TransactionId, Transaction>,
    transfers: Vec<Transfer>,
    finished: bool,
}

impl MemoryTx {
    fn ensure_open(&self) -> LedgerResult<()> {
        if self.finished {
            return Err(LedgerError::Storage(
                "unit of work already committed".to_string(),
            ));
        }
        Ok(())
    }

    fn ensure_locked(&self, id: AccountId) -> LedgerResult<()> {
        if self.guards.contains_key(&id) {
            Ok(())
        } else {
            Err(LedgerError::Storage(format!(
                "account {id} written without holding its lock"
            )))
        }
    }

    async fn acquire(&mut self, id: AccountId) -> LedgerResult<()> {
        if self.guards.contains_key(&id) {
            return Ok(());
        }
        let lock = self.shared.account_lock(id).await;
        let guard = tokio::time::timeout(self.lock_timeout, lock.lock_owned())
            .await
            .map_err(|_| {
                LedgerError::ConcurrencyConflict(format!(
                    "timed out after {:?} waiting for account {id}",
                    self.lock_timeout
                ))
            })?;
        self.guards.insert(id, guard);
        Ok(())
    }
}

#[async_trait]
impl LedgerTx for MemoryTx {
    async fn lock_accounts(&mut self, ids: &[AccountId]) -> LedgerResult<Vec<Account>> {
        self.ensure_open()?;
        let mut locked = Vec::with_capacity(ids.len());
        for id in lock_order(ids) {
            self.acquire(id).await?;
            let current = match self.accounts.get(&id) {
                Some((read, staged)) => staged.clone().unwrap_or_else(|| read.clone()),
                None => {
                    let account = self
                        .shared
                        .tables
                        .read()
                        .await
                        .accounts
                        .get(&id)
                        .cloned()
                        .ok_or(LedgerError::AccountNotFound(id))?;
                    self.accounts.insert(id, (account.clone(), None));
                    account
                }
            };
            locked.push(current);
        }
        Ok(locked)
    }

    async fn save_account(&mut self, account: &Account) -> LedgerResult<()> {
        self.ensure_open()?;
        self.ensure_locked(account.id)?;
        let (read, staged) = self
            .accounts
            .get_mut(&account.id)
            .ok_or(LedgerError::AccountNotFound(account.id))?;
        if read.version != account.version {
            return Err(LedgerError::ConcurrencyConflict(format!(
                "account {} changed since it was read",
                account.id
            )));
        }
        *staged = Some(account.clone());
        Ok(())
    }

    async fn read_option(&mut self, id: OptionId) -> LedgerResult<(BetOption, Match)> {
        self.ensure_open()?;
        let tables = self.shared.tables.read().await;
        let option = tables
            .options
            .get(&id)
            .cloned()
            .ok_or(LedgerError::OptionNotFound(id))?;
        let fixture = tables
            .matches
            .get(&option.match_id)
            .cloned()
            .ok_or(LedgerError::MatchNotFound(option.match_id))?;
        Ok((option, fixture))
    }

    async fn insert_bet(&mut self, new: &NewBet) -> LedgerResult<Bet> {
        self.ensure_open()?;
        self.ensure_locked(new.account_id)?;
        let bet = Bet {
            id: next_id(&self.shared.sequences.bets),
            account_id: new.account_id,
            option_id: new.option_id,
            amount: new.amount,
            odds: new.odds,
            potential_win: new.potential_win,
            status: BetStatus::Pending,
            created_at: Utc::now(),
            settled_at: None,
        };
        self.bets.insert(bet.id, bet.clone());
        Ok(bet)
    }

    async fn lock_bet(&mut self, id: BetId) -> LedgerResult<Bet> {
        self.ensure_open()?;
        if let Some(bet) = self.bets.get(&id) {
            return Ok(bet.clone());
        }
        let owner = self
            .shared
            .tables
            .read()
            .await
            .bets
            .get(&id)
            .map(|b| b.account_id)
            .ok_or(LedgerError::BetNotFound(id))?;
        self.acquire(owner).await?;
        // Re-read under the owner's lock: the status may have moved while waiting
        let bet = self
            .shared
            .tables
            .read()
            .await
            .bets
            .get(&id)
            .cloned()
            .ok_or(LedgerError::BetNotFound(id))?;
        self.bets.insert(id, bet.clone());
        Ok(bet)
    }

    async fn close_bet(&mut self, id: BetId, status: BetStatus) -> LedgerResult<Bet> {
        self.ensure_open()?;
        let bet = self
            .bets
            .get_mut(&id)
            .ok_or_else(|| LedgerError::Storage(format!("bet {id} closed without lock")))?;
        if bet.status != BetStatus::Pending {
            return Err(LedgerError::invalid_transition("bet", bet.status, status));
        }
        bet.status = status;
        bet.settled_at = Some(Utc::now());
        Ok(bet.clone())
    }

    async fn append(&mut self, entry: &NewTransaction) -> LedgerResult<Transaction> {
        self.ensure_open()?;
        self.ensure_locked(entry.account_id)?;
        let now = Utc::now();
        let transaction = Transaction {
            id: next_id(&self.shared.sequences.transactions),
            account_id: entry.account_id,
            amount: entry.amount,
            kind: entry.kind,
            status: entry.status,
            balance_after: entry.balance_after,
            reference_id: entry.reference_id,
            description: entry.description.clone(),
            admin_id: None,
            proof_ref: entry.proof_ref.clone(),
            created_at: now,
            processed_at: entry.status.is_terminal().then_some(now),
        };
        self.transactions.insert(transaction.id, transaction.clone());
        Ok(transaction)
    }

    async fn lock_transaction(&mut self, id: TransactionId) -> LedgerResult<Transaction> {
        self.ensure_open()?;
        if let Some(transaction) = self.transactions.get(&id) {
            return Ok(transaction.clone());
        }
        let owner = self
            .shared
            .tables
            .read()
            .await
            .transactions
            .get(&id)
            .map(|t| t.account_id)
            .ok_or(LedgerError::TransactionNotFound(id))?;
        self.acquire(owner).await?;
        let transaction = self
            .shared
            .tables
            .read()
            .await
            .transactions
            .get(&id)
            .cloned()
            .ok_or(LedgerError::TransactionNotFound(id))?;
        self.transactions.insert(id, transaction.clone());
        Ok(transaction)
    }

    async fn resolve(
        &mut self,
        id: TransactionId,
        resolution: &Resolution,
    ) -> LedgerResult<Transaction> {
        self.ensure_open()?;
        let transaction = self.transactions.get_mut(&id).ok_or_else(|| {
            LedgerError::Storage(format!("transaction {id} resolved without lock"))
        })?;
        if transaction.status != TransactionStatus::Pending {
            return Err(LedgerError::invalid_transition(
                "transaction",
                transaction.status,
                resolution.status,
            ));
        }
        transaction.status = resolution.status;
        transaction.admin_id = Some(resolution.admin_id);
        transaction.balance_after = resolution.balance_after;
        if resolution.description.is_some() {
            transaction.description = resolution.description.clone();
        }
        transaction.processed_at = Some(Utc::now());
        Ok(transaction.clone())
    }

    async fn insert_transfer(&mut self, new: &NewTransfer) -> LedgerResult<Transfer> {
        self.ensure_open()?;
        self.ensure_locked(new.sender_id)?;
        self.ensure_locked(new.receiver_id)?;
        let transfer = Transfer {
            id: next_id(&self.shared.sequences.transfers),
            sender_id: new.sender_id,
            receiver_id: new.receiver_id,
            amount: new.amount,
            created_at: Utc::now(),
        };
        self.transfers.push(transfer.clone());
        Ok(transfer)
    }

    async fn commit(&mut self) -> LedgerResult<()> {
        self.ensure_open()?;
        let mut tables = self.shared.tables.write().await;

        // Validate every staged account before publishing anything
        for (id, (read, staged)) in &self.accounts {
            if staged.is_none() {
                continue;
            }
            let current = tables
                .accounts
                .get(id)
                .ok_or(LedgerError::AccountNotFound(*id))?;
            if current.version != read.version {
                return Err(LedgerError::ConcurrencyConflict(format!(
                    "account {id} changed before commit"
                )));
            }
        }

        // A bet placed in this unit only lands while its option is still open
        for bet in self.bets.values() {
            if tables.bets.contains_key(&bet.id) {
                continue;
            }
            let open = tables.options.get(&bet.option_id).is_some_and(|option| {
                option.active
                    && tables
                        .matches
                        .get(&option.match_id)
                        .is_some_and(|fixture| fixture.status == MatchStatus::Scheduled)
            });
            if !open {
                return Err(LedgerError::OptionInactive(bet.option_id));
            }
        }

        for (id, (_, staged)) in std::mem::take(&mut self.accounts) {
            let Some(staged) = staged else { continue };
            if let Some(current) = tables.accounts.get_mut(&id) {
                current.balance = staged.balance;
                current.active = staged.active;
                current.is_admin = staged.is_admin;
                current.version += 1;
                current.updated_at = Utc::now();
            }
        }
        for (id, bet) in std::mem::take(&mut self.bets) {
            tables.bets.insert(id, bet);
        }
        for (id, transaction) in std::mem::take(&mut self.transactions) {
            tables.transactions.insert(id, transaction);
        }
        for transfer in std::mem::take(&mut self.transfers) {
            tables.transfers.insert(transfer.id, transfer);
        }
        drop(tables);

        self.finished = true;
        self.guards.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_dropped_unit_of_work_leaves_no_trace() {
        let store = MemoryLedgerStore::new();
        store.upsert_account(1, "Ana").await.unwrap();

        {
            let mut tx = store.begin().await.unwrap();
            let mut accounts = tx.lock_accounts(&[1]).await.unwrap();
            accounts[0].credit(dec!(10.00)).unwrap();
            tx.save_account(&accounts[0]).await.unwrap();
            // dropped without commit
        }

        let account = store.find_account(1).await.unwrap().unwrap();
        assert_eq!(account.balance, dec!(0.00));
        assert_eq!(account.version, 0);
    }

    #[tokio::test]
    async fn test_commit_bumps_version() {
        let store = MemoryLedgerStore::new();
        store.upsert_account(1, "Ana").await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let mut accounts = tx.lock_accounts(&[1]).await.unwrap();
        accounts[0].credit(dec!(10.00)).unwrap();
        tx.save_account(&accounts[0]).await.unwrap();
        tx.commit().await.unwrap();

        let account = store.find_account(1).await.unwrap().unwrap();
        assert_eq!(account.balance, dec!(10.00));
        assert_eq!(account.version, 1);
    }

    #[tokio::test]
    async fn test_unknown_account_is_not_found() {
        let store = MemoryLedgerStore::new();
        let mut tx = store.begin().await.unwrap();
        let err = tx.lock_accounts(&[404]).await.unwrap_err();
        assert!(matches!(err, LedgerError::AccountNotFound(404)));
    }

    #[tokio::test]
    async fn test_lock_wait_is_bounded() {
        let store = MemoryLedgerStore::with_lock_timeout(Duration::from_millis(50));
        store.upsert_account(1, "Ana").await.unwrap();

        let mut holder = store.begin().await.unwrap();
        holder.lock_accounts(&[1]).await.unwrap();

        let mut waiter = store.begin().await.unwrap();
        let err = waiter.lock_accounts(&[1]).await.unwrap_err();
        assert!(err.is_retryable());

        drop(holder);
        assert!(waiter.lock_accounts(&[1]).await.is_ok());
    }

    #[tokio::test]
    async fn test_stale_version_is_rejected() {
        let store = MemoryLedgerStore::new();
        store.upsert_account(1, "Ana").await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let mut accounts = tx.lock_accounts(&[1]).await.unwrap();
        accounts[0].version += 7;
        let err = tx.save_account(&accounts[0]).await.unwrap_err();
        assert!(matches!(err, LedgerError::ConcurrencyConflict(_)));
    }

    #[tokio::test]
    async fn test_writes_require_lock() {
        let store = MemoryLedgerStore::new();
        store.upsert_account(1, "Ana").await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let transfer = NewTransfer {
            sender_id: 1,
            receiver_id: 2,
            amount: dec!(1.00),
        };
        assert!(matches!(
            tx.insert_transfer(&transfer).await,
            Err(LedgerError::Storage(_))
        ));
    }

    #[tokio::test]
    async fn test_upsert_refreshes_display_name_only() {
        let store = MemoryLedgerStore::new();
        store.upsert_account(1, "Ana").await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let mut accounts = tx.lock_accounts(&[1]).await.unwrap();
        accounts[0].credit(dec!(5.00)).unwrap();
        tx.save_account(&accounts[0]).await.unwrap();
        tx.commit().await.unwrap();

        let account = store.upsert_account(1, "Ana María").await.unwrap();
        assert_eq!(account.display_name, "Ana María");
        assert_eq!(account.balance, dec!(5.00));
    }

    #[tokio::test]
    async fn test_bet_on_option_closed_before_commit_is_discarded() {
        let store = MemoryLedgerStore::new();
        store.upsert_account(1, "Ana").await.unwrap();
        let fixture = store
            .insert_match(&NewMatch {
                home_team: "Boca".to_string(),
                away_team: "River".to_string(),
                starts_at: Utc::now() + chrono::Duration::hours(1),
            })
            .await
            .unwrap();
        let option = store
            .insert_option(&NewBetOption {
                match_id: fixture.id,
                prediction: "draw".to_string(),
                odds: dec!(3.00),
            })
            .await
            .unwrap();

        let mut tx = store.begin().await.unwrap();
        let (read, _) = tx.read_option(option.id).await.unwrap();
        assert!(read.active);
        tx.lock_accounts(&[1]).await.unwrap();
        tx.insert_bet(&NewBet {
            account_id: 1,
            option_id: option.id,
            amount: dec!(1.00),
            odds: dec!(3.00),
            potential_win: dec!(3.00),
        })
        .await
        .unwrap();

        store.set_option_active(option.id, false).await.unwrap();
        let err = tx.commit().await.unwrap_err();
        assert!(matches!(err, LedgerError::OptionInactive(id) if id == option.id));
        assert!(store.pending_bets_for_option(option.id).await.unwrap().is_empty());
    }
}
