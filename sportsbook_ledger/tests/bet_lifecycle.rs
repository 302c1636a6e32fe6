//! Integration tests for the bet lifecycle through the public ledger API.
//!
//! Accounts are funded through approved deposit requests so every test
//! exercises the same path the chat front-end uses.

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sportsbook_ledger::{
    AccountId, BetOutcome, BetStatus, Ledger, LedgerConfig, LedgerError, MatchStatus, OptionId,
    RequestKind, TransactionKind,
};

const ADMIN: AccountId = 1_000;

/// Helper to create a ledger with one funded account and an open option at odds 2.00
async fn setup(balance: Decimal) -> (Ledger, OptionId) {
    let ledger = Ledger::in_memory(&LedgerConfig::default());
    ledger.accounts().open_account(ADMIN, "ops").await.unwrap();
    ledger.accounts().set_admin(ADMIN, true).await.unwrap();
    ledger.accounts().open_account(1, "Ana").await.unwrap();

    if balance > Decimal::ZERO {
        let request = ledger
            .create_transaction_request(1, RequestKind::Deposit, balance, None)
            .await
            .unwrap();
        ledger.approve_transaction(request.id, ADMIN).await.unwrap();
    }

    let fixture = ledger
        .markets()
        .create_match("Boca", "River", Utc::now() + Duration::hours(4))
        .await
        .unwrap();
    let option = ledger
        .markets()
        .add_option(fixture.id, "Boca", dec!(2.00))
        .await
        .unwrap();

    (ledger, option.id)
}

#[tokio::test]
async fn test_bet_win_scenario() {
    let (ledger, option_id) = setup(dec!(100.00)).await;

    let bet = ledger.place_bet(1, option_id, dec!(30.00)).await.unwrap();
    assert_eq!(ledger.get_balance(1).await.unwrap(), dec!(70.00));
    assert_eq!(bet.potential_win, dec!(60.00));

    ledger.settle_bet(bet.id, BetOutcome::Won).await.unwrap();
    assert_eq!(ledger.get_balance(1).await.unwrap(), dec!(130.00));

    let history = ledger.list_transactions(1, 10).await.unwrap();
    let kinds: Vec<_> = history.iter().map(|t| t.kind).collect();
    assert_eq!(
        kinds,
        vec![
            TransactionKind::BetPayout,
            TransactionKind::BetStake,
            TransactionKind::Deposit
        ]
    );
    assert_eq!(history[0].amount, dec!(60.00));
    assert_eq!(history[0].balance_after, Some(dec!(130.00)));
    assert_eq!(history[1].amount, dec!(-30.00));
    assert_eq!(history[1].reference_id, Some(bet.id));
}

#[tokio::test]
async fn test_bet_loss_keeps_stake() {
    let (ledger, option_id) = setup(dec!(100.00)).await;
    let bet = ledger.place_bet(1, option_id, dec!(30.00)).await.unwrap();

    let lost = ledger.settle_bet(bet.id, BetOutcome::Lost).await.unwrap();
    assert_eq!(lost.status, BetStatus::Lost);
    assert_eq!(ledger.get_balance(1).await.unwrap(), dec!(70.00));
    assert_eq!(ledger.list_transactions(1, 10).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_terminal_bets_never_change() {
    let (ledger, option_id) = setup(dec!(100.00)).await;
    let bet = ledger.place_bet(1, option_id, dec!(10.00)).await.unwrap();
    ledger.settle_bet(bet.id, BetOutcome::Lost).await.unwrap();

    for attempt in [
        ledger.settle_bet(bet.id, BetOutcome::Won).await,
        ledger.settle_bet(bet.id, BetOutcome::Lost).await,
        ledger.cancel_bet(bet.id).await,
    ] {
        assert!(matches!(
            attempt,
            Err(LedgerError::InvalidStateTransition { .. })
        ));
    }
    assert_eq!(ledger.get_balance(1).await.unwrap(), dec!(90.00));
}

#[tokio::test]
async fn test_unknown_references() {
    let (ledger, option_id) = setup(dec!(10.00)).await;

    assert!(matches!(
        ledger.place_bet(42, option_id, dec!(1.00)).await,
        Err(LedgerError::AccountNotFound(42))
    ));
    assert!(matches!(
        ledger.settle_bet(777, BetOutcome::Won).await,
        Err(LedgerError::BetNotFound(777))
    ));
    assert!(matches!(
        ledger.cancel_bet(777).await,
        Err(LedgerError::BetNotFound(777))
    ));
    assert!(ledger.list_bets_by_status(42, None).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_invalid_amounts_rejected_before_io() {
    let (ledger, option_id) = setup(dec!(10.00)).await;
    for amount in [dec!(0), dec!(-1.00), dec!(0.001)] {
        assert!(matches!(
            ledger.place_bet(1, option_id, amount).await,
            Err(LedgerError::InvalidAmount(_))
        ));
    }
    assert_eq!(ledger.get_balance(1).await.unwrap(), dec!(10.00));
}

#[tokio::test]
async fn test_list_bets_by_status() {
    let (ledger, option_id) = setup(dec!(100.00)).await;
    let first = ledger.place_bet(1, option_id, dec!(1.00)).await.unwrap();
    let second = ledger.place_bet(1, option_id, dec!(2.00)).await.unwrap();
    let third = ledger.place_bet(1, option_id, dec!(3.00)).await.unwrap();
    ledger.settle_bet(first.id, BetOutcome::Won).await.unwrap();
    ledger.cancel_bet(second.id).await.unwrap();

    let all = ledger.list_bets_by_status(1, None).await.unwrap();
    assert_eq!(
        all.iter().map(|b| b.id).collect::<Vec<_>>(),
        vec![third.id, second.id, first.id]
    );

    let pending = ledger
        .list_bets_by_status(1, Some(BetStatus::Pending))
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, third.id);

    let won = ledger
        .list_bets_by_status(1, Some(BetStatus::Won))
        .await
        .unwrap();
    assert_eq!(won[0].id, first.id);
}

#[tokio::test]
async fn test_pending_bets_survive_match_start() {
    let (ledger, option_id) = setup(dec!(50.00)).await;
    let bet = ledger.place_bet(1, option_id, dec!(20.00)).await.unwrap();

    let option = ledger.markets().get_option(option_id).await.unwrap();
    ledger
        .markets()
        .set_match_status(option.match_id, MatchStatus::Live, None)
        .await
        .unwrap();

    assert!(matches!(
        ledger.place_bet(1, option_id, dec!(1.00)).await,
        Err(LedgerError::OptionInactive(_))
    ));

    let report = ledger
        .bets()
        .settle_option(option_id, BetOutcome::Won)
        .await
        .unwrap();
    assert_eq!(report.won, 1);
    assert_eq!(report.paid_out, dec!(40.00));
    assert_eq!(ledger.bets().get_bet(bet.id).await.unwrap().status, BetStatus::Won);
    assert_eq!(ledger.get_balance(1).await.unwrap(), dec!(70.00));
}

#[tokio::test]
async fn test_deactivated_account_still_collects_winnings() {
    let (ledger, option_id) = setup(dec!(50.00)).await;
    let bet = ledger.place_bet(1, option_id, dec!(10.00)).await.unwrap();
    ledger.accounts().deactivate(1).await.unwrap();

    assert!(matches!(
        ledger.place_bet(1, option_id, dec!(1.00)).await,
        Err(LedgerError::AccountInactive(1))
    ));

    ledger.settle_bet(bet.id, BetOutcome::Won).await.unwrap();
    assert_eq!(ledger.get_balance(1).await.unwrap(), dec!(60.00));
}
