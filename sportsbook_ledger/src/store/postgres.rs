//! PostgreSQL ledger store.
//!
//! Units of work are database transactions. Account, bet and transaction
//! rows are locked with `SELECT ... FOR UPDATE`; `lock_timeout` is set per
//! transaction so a blocked writer fails with SQLSTATE `55P03`, which
//! [`LedgerError`] maps to a retryable conflict.
#![allow(clippy::needless_raw_string_hashes)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction as PgTransaction};

use super::{LedgerStore, LedgerTx, lock_order};
use crate::accounts::{Account, AccountId};
use crate::audit::{NewTransaction, Resolution, Transaction, TransactionId};
use crate::betting::{Bet, BetId, BetStatus, NewBet};
use crate::db::timeouts::{DEFAULT_QUERY_TIMEOUT, with_timeout};
use crate::errors::{LedgerError, LedgerResult};
use crate::markets::{BetOption, Match, MatchId, MatchStatus, NewBetOption, NewMatch, OptionId};
use crate::transfers::{NewTransfer, Transfer, TransferDirection, TransferId};

const ACCOUNT_COLUMNS: &str =
    "id, display_name, balance, active, is_admin, version, created_at, updated_at";
const MATCH_COLUMNS: &str =
    "id, home_team, away_team, starts_at, status, result, created_at, updated_at";
const OPTION_COLUMNS: &str = "id, match_id, prediction, odds, active";
const BET_COLUMNS: &str =
    "id, account_id, option_id, amount, odds, potential_win, status, created_at, settled_at";
const TRANSACTION_COLUMNS: &str = "id, account_id, amount, kind, status, balance_after, \
     reference_id, description, admin_id, proof_ref, created_at, processed_at";
const TRANSFER_COLUMNS: &str = "id, sender_id, receiver_id, amount, created_at";

fn account_from_row(row: &PgRow) -> LedgerResult<Account> {
    Ok(Account {
        id: row.try_get("id")?,
        display_name: row.try_get("display_name")?,
        balance: row.try_get("balance")?,
        active: row.try_get("active")?,
        is_admin: row.try_get("is_admin")?,
        version: row.try_get("version")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn match_from_row(row: &PgRow) -> LedgerResult<Match> {
    Ok(Match {
        id: row.try_get("id")?,
        home_team: row.try_get("home_team")?,
        away_team: row.try_get("away_team")?,
        starts_at: row.try_get("starts_at")?,
        status: row.try_get::<String, _>("status")?.parse()?,
        result: row.try_get("result")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn option_from_row(row: &PgRow) -> LedgerResult<BetOption> {
    Ok(BetOption {
        id: row.try_get("id")?,
        match_id: row.try_get("match_id")?,
        prediction: row.try_get("prediction")?,
        odds: row.try_get("odds")?,
        active: row.try_get("active")?,
    })
}

fn bet_from_row(row: &PgRow) -> LedgerResult<Bet> {
    Ok(Bet {
        id: row.try_get("id")?,
        account_id: row.try_get("account_id")?,
        option_id: row.try_get("option_id")?,
        amount: row.try_get("amount")?,
        odds: row.try_get("odds")?,
        potential_win: row.try_get("potential_win")?,
        status: row.try_get::<String, _>("status")?.parse()?,
        created_at: row.try_get("created_at")?,
        settled_at: row.try_get("settled_at")?,
    })
}

fn transaction_from_row(row: &PgRow) -> LedgerResult<Transaction> {
    Ok(Transaction {
        id: row.try_get("id")?,
        account_id: row.try_get("account_id")?,
        amount: row.try_get("amount")?,
        kind: row.try_get::<String, _>("kind")?.parse()?,
        status: row.try_get::<String, _>("status")?.parse()?,
        balance_after: row.try_get("balance_after")?,
        reference_id: row.try_get("reference_id")?,
        description: row.try_get("description")?,
        admin_id: row.try_get("admin_id")?,
        proof_ref: row.try_get("proof_ref")?,
        created_at: row.try_get("created_at")?,
        processed_at: row.try_get("processed_at")?,
    })
}

fn transfer_from_row(row: &PgRow) -> LedgerResult<Transfer> {
    Ok(Transfer {
        id: row.try_get("id")?,
        sender_id: row.try_get("sender_id")?,
        receiver_id: row.try_get("receiver_id")?,
        amount: row.try_get("amount")?,
        created_at: row.try_get("created_at")?,
    })
}

fn collect<T>(rows: &[PgRow], map: fn(&PgRow) -> LedgerResult<T>) -> LedgerResult<Vec<T>> {
    rows.iter().map(map).collect()
}

/// PostgreSQL-backed ledger store
#[derive(Clone)]
pub struct PgLedgerStore {
    pool: Arc<PgPool>,
    lock_timeout: Duration,
}

impl PgLedgerStore {
    /// Create a store over an existing pool
    ///
    /// # Arguments
    ///
    /// * `pool` - Database connection pool (migrations already applied)
    /// * `lock_timeout` - Longest a unit of work waits for a row lock
    pub fn new(pool: Arc<PgPool>, lock_timeout: Duration) -> Self {
        Self { pool, lock_timeout }
    }

    fn pool(&self) -> &PgPool {
        self.pool.as_ref()
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn begin(&self) -> LedgerResult<Box<dyn LedgerTx>> {
        let mut tx = self.pool.begin().await?;

        // SET does not accept bind parameters
        let statement = format!("SET LOCAL lock_timeout = '{}ms'", self.lock_timeout.as_millis());
        sqlx::query(&statement).execute(&mut *tx).await?;

        Ok(Box::new(PgTx { tx: Some(tx) }))
    }

    async fn ping(&self) -> LedgerResult<()> {
        with_timeout(DEFAULT_QUERY_TIMEOUT, sqlx::query("SELECT 1").execute(self.pool()))
            .await?;
        Ok(())
    }

    async fn upsert_account(&self, id: AccountId, display_name: &str) -> LedgerResult<Account> {
        let sql = format!(
            r#"
            INSERT INTO accounts (id, display_name)
            VALUES ($1, $2)
            ON CONFLICT (id) DO UPDATE
            SET display_name = EXCLUDED.display_name,
                updated_at = CASE
                    WHEN accounts.display_name <> EXCLUDED.display_name THEN NOW()
                    ELSE accounts.updated_at
                END
            RETURNING {ACCOUNT_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(display_name)
            .fetch_one(self.pool())
            .await?;
        account_from_row(&row)
    }

    async fn find_account(&self, id: AccountId) -> LedgerResult<Option<Account>> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1");
        let row = with_timeout(
            DEFAULT_QUERY_TIMEOUT,
            sqlx::query(&sql).bind(id).fetch_optional(self.pool()),
        )
        .await?;
        row.as_ref().map(account_from_row).transpose()
    }

    async fn insert_match(&self, new: &NewMatch) -> LedgerResult<Match> {
        let sql = format!(
            "INSERT INTO matches (home_team, away_team, starts_at) \
             VALUES ($1, $2, $3) RETURNING {MATCH_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(&new.home_team)
            .bind(&new.away_team)
            .bind(new.starts_at)
            .fetch_one(self.pool())
            .await?;
        match_from_row(&row)
    }

    async fn find_match(&self, id: MatchId) -> LedgerResult<Option<Match>> {
        let sql = format!("SELECT {MATCH_COLUMNS} FROM matches WHERE id = $1");
        let row = with_timeout(
            DEFAULT_QUERY_TIMEOUT,
            sqlx::query(&sql).bind(id).fetch_optional(self.pool()),
        )
        .await?;
        row.as_ref().map(match_from_row).transpose()
    }

    async fn upcoming_matches(&self, limit: i64) -> LedgerResult<Vec<Match>> {
        let sql = format!(
            "SELECT {MATCH_COLUMNS} FROM matches \
             WHERE status = 'scheduled' AND starts_at > NOW() \
             ORDER BY starts_at, id LIMIT $1"
        );
        let rows = with_timeout(
            DEFAULT_QUERY_TIMEOUT,
            sqlx::query(&sql).bind(limit.max(0)).fetch_all(self.pool()),
        )
        .await?;
        collect(&rows, match_from_row)
    }

    async fn update_match_status(
        &self,
        id: MatchId,
        status: MatchStatus,
        result: Option<&str>,
    ) -> LedgerResult<Match> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "UPDATE matches SET status = $2, result = COALESCE($3, result), updated_at = NOW() \
             WHERE id = $1 RETURNING {MATCH_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(status.as_str())
            .bind(result)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(LedgerError::MatchNotFound(id))?;
        let fixture = match_from_row(&row)?;

        if status != MatchStatus::Scheduled {
            sqlx::query("UPDATE match_bet_options SET active = FALSE WHERE match_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(fixture)
    }

    async fn insert_option(&self, new: &NewBetOption) -> LedgerResult<BetOption> {
        let sql = format!(
            r#"
            INSERT INTO match_bet_options (match_id, prediction, odds)
            SELECT $1, $2, $3
            WHERE EXISTS (SELECT 1 FROM matches WHERE id = $1)
            RETURNING {OPTION_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(new.match_id)
            .bind(&new.prediction)
            .bind(new.odds)
            .fetch_optional(self.pool())
            .await?
            .ok_or(LedgerError::MatchNotFound(new.match_id))?;
        option_from_row(&row)
    }

    async fn find_option(&self, id: OptionId) -> LedgerResult<Option<BetOption>> {
        let sql = format!("SELECT {OPTION_COLUMNS} FROM match_bet_options WHERE id = $1");
        let row = with_timeout(
            DEFAULT_QUERY_TIMEOUT,
            sqlx::query(&sql).bind(id).fetch_optional(self.pool()),
        )
        .await?;
        row.as_ref().map(option_from_row).transpose()
    }

    async fn options_for_match(
        &self,
        match_id: MatchId,
        active_only: bool,
    ) -> LedgerResult<Vec<BetOption>> {
        let sql = format!(
            "SELECT {OPTION_COLUMNS} FROM match_bet_options \
             WHERE match_id = $1 AND (active OR NOT $2) ORDER BY id"
        );
        let rows = with_timeout(
            DEFAULT_QUERY_TIMEOUT,
            sqlx::query(&sql)
                .bind(match_id)
                .bind(active_only)
                .fetch_all(self.pool()),
        )
        .await?;
        collect(&rows, option_from_row)
    }

    async fn set_option_active(&self, id: OptionId, active: bool) -> LedgerResult<BetOption> {
        let sql = format!(
            "UPDATE match_bet_options SET active = $2 WHERE id = $1 RETURNING {OPTION_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(active)
            .fetch_optional(self.pool())
            .await?
            .ok_or(LedgerError::OptionNotFound(id))?;
        option_from_row(&row)
    }

    async fn find_bet(&self, id: BetId) -> LedgerResult<Option<Bet>> {
        let sql = format!("SELECT {BET_COLUMNS} FROM bets WHERE id = $1");
        let row = with_timeout(
            DEFAULT_QUERY_TIMEOUT,
            sqlx::query(&sql).bind(id).fetch_optional(self.pool()),
        )
        .await?;
        row.as_ref().map(bet_from_row).transpose()
    }

    async fn bets_for_account(
        &self,
        account_id: AccountId,
        status: Option<BetStatus>,
    ) -> LedgerResult<Vec<Bet>> {
        let sql = format!(
            "SELECT {BET_COLUMNS} FROM bets \
             WHERE account_id = $1 AND ($2::TEXT IS NULL OR status = $2) \
             ORDER BY created_at DESC, id DESC"
        );
        let rows = with_timeout(
            DEFAULT_QUERY_TIMEOUT,
            sqlx::query(&sql)
                .bind(account_id)
                .bind(status.map(|s| s.as_str()))
                .fetch_all(self.pool()),
        )
        .await?;
        collect(&rows, bet_from_row)
    }

    async fn pending_bets_for_option(&self, option_id: OptionId) -> LedgerResult<Vec<BetId>> {
        let rows = with_timeout(
            DEFAULT_QUERY_TIMEOUT,
            sqlx::query("SELECT id FROM bets WHERE option_id = $1 AND status = 'pending' ORDER BY id")
                .bind(option_id)
                .fetch_all(self.pool()),
        )
        .await?;
        Ok(rows
            .iter()
            .map(|row| row.try_get::<BetId, _>("id"))
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn find_transaction(&self, id: TransactionId) -> LedgerResult<Option<Transaction>> {
        let sql = format!("SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = $1");
        let row = with_timeout(
            DEFAULT_QUERY_TIMEOUT,
            sqlx::query(&sql).bind(id).fetch_optional(self.pool()),
        )
        .await?;
        row.as_ref().map(transaction_from_row).transpose()
    }

    async fn transactions_for_account(
        &self,
        account_id: AccountId,
        limit: i64,
    ) -> LedgerResult<Vec<Transaction>> {
        let sql = format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions \
             WHERE account_id = $1 ORDER BY created_at DESC, id DESC LIMIT $2"
        );
        let rows = with_timeout(
            DEFAULT_QUERY_TIMEOUT,
            sqlx::query(&sql)
                .bind(account_id)
                .bind(limit.max(0))
                .fetch_all(self.pool()),
        )
        .await?;
        collect(&rows, transaction_from_row)
    }

    async fn pending_requests(&self) -> LedgerResult<Vec<Transaction>> {
        let sql = format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions \
             WHERE status = 'pending' ORDER BY created_at, id"
        );
        let rows =
            with_timeout(DEFAULT_QUERY_TIMEOUT, sqlx::query(&sql).fetch_all(self.pool())).await?;
        collect(&rows, transaction_from_row)
    }

    async fn find_transfer(&self, id: TransferId) -> LedgerResult<Option<Transfer>> {
        let sql = format!("SELECT {TRANSFER_COLUMNS} FROM transfers WHERE id = $1");
        let row = with_timeout(
            DEFAULT_QUERY_TIMEOUT,
            sqlx::query(&sql).bind(id).fetch_optional(self.pool()),
        )
        .await?;
        row.as_ref().map(transfer_from_row).transpose()
    }

    async fn transfers_for_account(
        &self,
        account_id: AccountId,
        direction: TransferDirection,
        limit: i64,
    ) -> LedgerResult<Vec<Transfer>> {
        let filter = match direction {
            TransferDirection::Sent => "sender_id = $1",
            TransferDirection::Received => "receiver_id = $1",
            TransferDirection::All => "(sender_id = $1 OR receiver_id = $1)",
        };
        let sql = format!(
            "SELECT {TRANSFER_COLUMNS} FROM transfers WHERE {filter} \
             ORDER BY created_at DESC, id DESC LIMIT $2"
        );
        let rows = with_timeout(
            DEFAULT_QUERY_TIMEOUT,
            sqlx::query(&sql)
                .bind(account_id)
                .bind(limit.max(0))
                .fetch_all(self.pool()),
        )
        .await?;
        collect(&rows, transfer_from_row)
    }
}

/// Unit of work over one database transaction
///
/// Dropping it while `tx` is still `Some` rolls the transaction back.
struct PgTx {
    tx: Option<PgTransaction<'static, Postgres>>,
}

impl PgTx {
    fn conn(&mut self) -> LedgerResult<&mut PgTransaction<'static, Postgres>> {
        self.tx
            .as_mut()
            .ok_or_else(|| LedgerError::Storage("unit of work already committed".to_string()))
    }
}

#[async_trait]
impl LedgerTx for PgTx {
    async fn lock_accounts(&mut self, ids: &[AccountId]) -> LedgerResult<Vec<Account>> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1 FOR UPDATE");
        let tx = self.conn()?;
        let mut locked = Vec::with_capacity(ids.len());
        // One statement per row keeps the acquisition order deterministic
        for id in lock_order(ids) {
            let row = sqlx::query(&sql)
                .bind(id)
                .fetch_optional(&mut **tx)
                .await?
                .ok_or(LedgerError::AccountNotFound(id))?;
            locked.push(account_from_row(&row)?);
        }
        Ok(locked)
    }

    async fn save_account(&mut self, account: &Account) -> LedgerResult<()> {
        let tx = self.conn()?;
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET balance = $2, active = $3, is_admin = $4,
                version = version + 1, updated_at = NOW()
            WHERE id = $1 AND version = $5
            "#,
        )
        .bind(account.id)
        .bind(account.balance)
        .bind(account.active)
        .bind(account.is_admin)
        .bind(account.version)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::ConcurrencyConflict(format!(
                "account {} changed since it was read",
                account.id
            )));
        }
        Ok(())
    }

    async fn read_option(&mut self, id: OptionId) -> LedgerResult<(BetOption, Match)> {
        let tx = self.conn()?;
        let row = sqlx::query(
            r#"
            SELECT o.id, o.match_id, o.prediction, o.odds, o.active,
                   m.home_team, m.away_team, m.starts_at, m.status,
                   m.result, m.created_at, m.updated_at
            FROM match_bet_options o
            JOIN matches m ON m.id = o.match_id
            WHERE o.id = $1
            FOR SHARE OF o, m
            "#,
        )
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(LedgerError::OptionNotFound(id))?;

        let option = option_from_row(&row)?;
        let fixture = Match {
            id: option.match_id,
            home_team: row.try_get("home_team")?,
            away_team: row.try_get("away_team")?,
            starts_at: row.try_get("starts_at")?,
            status: row.try_get::<String, _>("status")?.parse()?,
            result: row.try_get("result")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        };
        Ok((option, fixture))
    }

    async fn insert_bet(&mut self, new: &NewBet) -> LedgerResult<Bet> {
        let sql = format!(
            "INSERT INTO bets (account_id, option_id, amount, odds, potential_win) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {BET_COLUMNS}"
        );
        let tx = self.conn()?;
        let row = sqlx::query(&sql)
            .bind(new.account_id)
            .bind(new.option_id)
            .bind(new.amount)
            .bind(new.odds)
            .bind(new.potential_win)
            .fetch_one(&mut **tx)
            .await?;
        bet_from_row(&row)
    }

    async fn lock_bet(&mut self, id: BetId) -> LedgerResult<Bet> {
        let sql = format!("SELECT {BET_COLUMNS} FROM bets WHERE id = $1 FOR UPDATE");
        let tx = self.conn()?;
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or(LedgerError::BetNotFound(id))?;
        bet_from_row(&row)
    }

    async fn close_bet(&mut self, id: BetId, status: BetStatus) -> LedgerResult<Bet> {
        let sql = format!(
            "UPDATE bets SET status = $2, settled_at = NOW() \
             WHERE id = $1 AND status = 'pending' RETURNING {BET_COLUMNS}"
        );
        let tx = self.conn()?;
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(status.as_str())
            .fetch_optional(&mut **tx)
            .await?;

        match row {
            Some(row) => bet_from_row(&row),
            None => {
                let current: Option<String> =
                    sqlx::query_scalar("SELECT status FROM bets WHERE id = $1")
                        .bind(id)
                        .fetch_optional(&mut **tx)
                        .await?;
                match current {
                    Some(from) => Err(LedgerError::invalid_transition("bet", from, status)),
                    None => Err(LedgerError::BetNotFound(id)),
                }
            }
        }
    }

    async fn append(&mut self, entry: &NewTransaction) -> LedgerResult<Transaction> {
        let sql = format!(
            r#"
            INSERT INTO transactions
                (account_id, amount, kind, status, balance_after, reference_id,
                 description, proof_ref, processed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8,
                    CASE WHEN $4 = 'pending' THEN NULL ELSE NOW() END)
            RETURNING {TRANSACTION_COLUMNS}
            "#
        );
        let tx = self.conn()?;
        let row = sqlx::query(&sql)
            .bind(entry.account_id)
            .bind(entry.amount)
            .bind(entry.kind.as_str())
            .bind(entry.status.as_str())
            .bind(entry.balance_after)
            .bind(entry.reference_id)
            .bind(&entry.description)
            .bind(&entry.proof_ref)
            .fetch_one(&mut **tx)
            .await?;
        transaction_from_row(&row)
    }

    async fn lock_transaction(&mut self, id: TransactionId) -> LedgerResult<Transaction> {
        let sql = format!("SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = $1 FOR UPDATE");
        let tx = self.conn()?;
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or(LedgerError::TransactionNotFound(id))?;
        transaction_from_row(&row)
    }

    async fn resolve(
        &mut self,
        id: TransactionId,
        resolution: &Resolution,
    ) -> LedgerResult<Transaction> {
        let sql = format!(
            r#"
            UPDATE transactions
            SET status = $2, admin_id = $3, balance_after = $4,
                description = COALESCE($5, description), processed_at = NOW()
            WHERE id = $1 AND status = 'pending'
            RETURNING {TRANSACTION_COLUMNS}
            "#
        );
        let tx = self.conn()?;
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(resolution.status.as_str())
            .bind(resolution.admin_id)
            .bind(resolution.balance_after)
            .bind(&resolution.description)
            .fetch_optional(&mut **tx)
            .await?;

        match row {
            Some(row) => transaction_from_row(&row),
            None => {
                let current: Option<String> =
                    sqlx::query_scalar("SELECT status FROM transactions WHERE id = $1")
                        .bind(id)
                        .fetch_optional(&mut **tx)
                        .await?;
                match current {
                    Some(from) => Err(LedgerError::invalid_transition(
                        "transaction",
                        from,
                        resolution.status,
                    )),
                    None => Err(LedgerError::TransactionNotFound(id)),
                }
            }
        }
    }

    async fn insert_transfer(&mut self, new: &NewTransfer) -> LedgerResult<Transfer> {
        let sql = format!(
            "INSERT INTO transfers (sender_id, receiver_id, amount) \
             VALUES ($1, $2, $3) RETURNING {TRANSFER_COLUMNS}"
        );
        let tx = self.conn()?;
        let row = sqlx::query(&sql)
            .bind(new.sender_id)
            .bind(new.receiver_id)
            .bind(new.amount)
            .fetch_one(&mut **tx)
            .await?;
        transfer_from_row(&row)
    }

    async fn commit(&mut self) -> LedgerResult<()> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| LedgerError::Storage("unit of work already committed".to_string()))?;
        tx.commit().await?;
        Ok(())
    }
}
