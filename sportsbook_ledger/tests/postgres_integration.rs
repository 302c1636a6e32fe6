//! Integration tests against a real PostgreSQL database.
//!
//! Skipped unless `DATABASE_URL` is set. Each test works on freshly numbered
//! accounts so runs never collide with rows left by earlier runs.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serial_test::serial;
use sportsbook_ledger::db::{Database, DatabaseConfig};
use sportsbook_ledger::store::{LedgerStore, LedgerTx, PgLedgerStore};
use sportsbook_ledger::{
    AccountId, BetOutcome, Ledger, LedgerConfig, LedgerError, OptionId, RequestKind,
    TransactionStatus,
};
use tokio::task::JoinSet;

/// Helper to connect and migrate, or `None` when no database is configured
async fn setup_test_db() -> Option<Database> {
    let database_url = std::env::var("DATABASE_URL").ok()?;
    let config = DatabaseConfig {
        database_url,
        max_connections: 20,
        min_connections: 1,
        connection_timeout_secs: 5,
        idle_timeout_secs: 300,
        max_lifetime_secs: 1800,
    };

    let db = Database::new(&config)
        .await
        .expect("Failed to create test database");
    db.migrate().await.expect("Migrations should apply");
    Some(db)
}

/// Account ids unique to this run
fn fresh_ids() -> (AccountId, AccountId, AccountId) {
    let base = (Utc::now().timestamp_micros() % 1_000_000_000_000) * 10;
    (base + 1, base + 2, base + 3)
}

async fn fund(ledger: &Ledger, admin: AccountId, account: AccountId, amount: Decimal) {
    let request = ledger
        .create_transaction_request(account, RequestKind::Deposit, amount, None)
        .await
        .unwrap();
    ledger.approve_transaction(request.id, admin).await.unwrap();
}

async fn open_option(ledger: &Ledger) -> OptionId {
    let fixture = ledger
        .markets()
        .create_match("Boca", "River", Utc::now() + chrono::Duration::hours(2))
        .await
        .unwrap();
    ledger
        .markets()
        .add_option(fixture.id, "Boca", dec!(2.00))
        .await
        .unwrap()
        .id
}

async fn setup() -> Option<(Ledger, AccountId, AccountId, AccountId)> {
    let db = setup_test_db().await?;
    let ledger = Ledger::connect(&db, &LedgerConfig::default());
    let (admin, a, b) = fresh_ids();
    ledger.accounts().open_account(admin, "ops").await.unwrap();
    ledger.accounts().set_admin(admin, true).await.unwrap();
    ledger.accounts().open_account(a, "Ana").await.unwrap();
    ledger.accounts().open_account(b, "Bruno").await.unwrap();
    Some((ledger, admin, a, b))
}

#[tokio::test]
#[serial]
async fn test_pg_bet_win_scenario() {
    let Some((ledger, admin, a, _)) = setup().await else {
        return;
    };
    fund(&ledger, admin, a, dec!(100.00)).await;
    let option_id = open_option(&ledger).await;

    let bet = ledger.place_bet(a, option_id, dec!(30.00)).await.unwrap();
    assert_eq!(ledger.get_balance(a).await.unwrap(), dec!(70.00));

    ledger.settle_bet(bet.id, BetOutcome::Won).await.unwrap();
    assert_eq!(ledger.get_balance(a).await.unwrap(), dec!(130.00));

    assert!(matches!(
        ledger.settle_bet(bet.id, BetOutcome::Won).await,
        Err(LedgerError::InvalidStateTransition { .. })
    ));
    assert_eq!(ledger.list_transactions(a, 10).await.unwrap().len(), 3);
}

#[tokio::test]
#[serial]
async fn test_pg_transfer_scenario() {
    let Some((ledger, admin, a, b)) = setup().await else {
        return;
    };
    fund(&ledger, admin, a, dec!(50.00)).await;
    fund(&ledger, admin, b, dec!(10.00)).await;

    // b has the higher id, so the sender is locked second
    ledger.transfer(b, a, dec!(10.00)).await.unwrap();
    ledger.transfer(a, b, dec!(30.00)).await.unwrap();

    assert_eq!(ledger.get_balance(a).await.unwrap(), dec!(30.00));
    assert_eq!(ledger.get_balance(b).await.unwrap(), dec!(30.00));

    assert!(matches!(
        ledger.transfer(a, b, dec!(30.01)).await,
        Err(LedgerError::InsufficientFunds { .. })
    ));
    assert_eq!(ledger.get_balance(a).await.unwrap(), dec!(30.00));
}

#[tokio::test]
#[serial]
async fn test_pg_failed_withdrawal_is_rejected() {
    let Some((ledger, admin, a, _)) = setup().await else {
        return;
    };
    fund(&ledger, admin, a, dec!(40.00)).await;

    let request = ledger
        .create_transaction_request(a, RequestKind::Withdrawal, dec!(50.00), None)
        .await
        .unwrap();
    assert!(matches!(
        ledger.approve_transaction(request.id, admin).await,
        Err(LedgerError::InsufficientFunds { .. })
    ));

    let stored = ledger.audit().get_transaction(request.id).await.unwrap();
    assert_eq!(stored.status, TransactionStatus::Rejected);
    assert_eq!(stored.admin_id, Some(admin));
    assert_eq!(ledger.get_balance(a).await.unwrap(), dec!(40.00));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
async fn test_pg_concurrent_bets_never_overdraw() {
    let Some((ledger, admin, a, _)) = setup().await else {
        return;
    };
    fund(&ledger, admin, a, dec!(50.00)).await;
    let option_id = open_option(&ledger).await;
    let ledger = Arc::new(ledger);

    let mut tasks = JoinSet::new();
    for _ in 0..15 {
        let ledger = ledger.clone();
        tasks.spawn(async move { ledger.place_bet(a, option_id, dec!(10.00)).await });
    }

    let mut placed = 0;
    while let Some(joined) = tasks.join_next().await {
        match joined.unwrap() {
            Ok(_) => placed += 1,
            Err(LedgerError::InsufficientFunds { .. }) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(placed, 5);
    assert_eq!(ledger.get_balance(a).await.unwrap(), dec!(0.00));
}

#[tokio::test]
#[serial]
async fn test_pg_lock_wait_is_bounded() {
    let Some(db) = setup_test_db().await else {
        return;
    };
    let (_, a, _) = fresh_ids();
    let store = PgLedgerStore::new(db.shared_pool(), Duration::from_millis(100));
    store.upsert_account(a, "Ana").await.unwrap();

    let mut holder = store.begin().await.unwrap();
    holder.lock_accounts(&[a]).await.unwrap();

    let mut waiter = store.begin().await.unwrap();
    let err = waiter.lock_accounts(&[a]).await.unwrap_err();
    assert!(err.is_retryable(), "expected a conflict, got {err}");

    drop(waiter);
    holder.commit().await.unwrap();
}
