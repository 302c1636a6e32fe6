//! Bet engine.

use std::sync::Arc;

use chrono::Utc;
use log::{debug, info};
use rust_decimal::Decimal;

use super::models::{Bet, BetId, BetOutcome, BetStatus, NewBet, SettlementReport};
use crate::accounts::AccountId;
use crate::audit::{NewTransaction, TransactionKind};
use crate::errors::{LedgerError, LedgerResult};
use crate::markets::OptionId;
use crate::money::{potential_win, validate_amount};
use crate::retry::RetryPolicy;
use crate::store::LedgerStore;

/// Bet engine
#[derive(Clone)]
pub struct BetEngine {
    store: Arc<dyn LedgerStore>,
    retry: RetryPolicy,
}

impl BetEngine {
    pub fn new(store: Arc<dyn LedgerStore>, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    /// Stake `amount` on an option
    ///
    /// Debits the stake, creates the pending bet with the option's current
    /// odds frozen in, and appends a `BetStake` entry, all in one unit of work.
    ///
    /// # Errors
    ///
    /// * `LedgerError::InvalidAmount` - amount not a positive cent value
    /// * `LedgerError::OptionNotFound` / `LedgerError::AccountNotFound`
    /// * `LedgerError::OptionInactive` - option closed, match not scheduled, or already kicked off
    /// * `LedgerError::InsufficientFunds` - nothing is written
    pub async fn place_bet(
        &self,
        account_id: AccountId,
        option_id: OptionId,
        amount: Decimal,
    ) -> LedgerResult<Bet> {
        let amount = validate_amount(amount)?;
        debug!("place_bet: account={account_id} option={option_id} amount={amount}");

        let bet = self
            .retry
            .run("place_bet", || {
                self.try_place_bet(account_id, option_id, amount)
            })
            .await?;

        info!(
            "Bet {} placed: account={} option={} amount={} odds={}",
            bet.id, bet.account_id, bet.option_id, bet.amount, bet.odds
        );
        Ok(bet)
    }

    async fn try_place_bet(
        &self,
        account_id: AccountId,
        option_id: OptionId,
        amount: Decimal,
    ) -> LedgerResult<Bet> {
        let mut tx = self.store.begin().await?;

        let (option, fixture) = tx.read_option(option_id).await?;
        if !option.is_open(&fixture, Utc::now()) {
            return Err(LedgerError::OptionInactive(option_id));
        }

        let mut account = tx
            .lock_accounts(&[account_id])
            .await?
            .pop()
            .ok_or(LedgerError::AccountNotFound(account_id))?;
        let payout = potential_win(amount, option.odds)?;

        account.debit(amount)?;
        tx.save_account(&account).await?;

        let bet = tx
            .insert_bet(&NewBet {
                account_id,
                option_id,
                amount,
                odds: option.odds,
                potential_win: payout,
            })
            .await?;

        tx.append(&NewTransaction::completed(
            &account,
            TransactionKind::BetStake,
            amount,
            Some(bet.id),
            format!(
                "Bet on {} ({} vs {})",
                option.prediction, fixture.home_team, fixture.away_team
            ),
        ))
        .await?;

        tx.commit().await?;
        Ok(bet)
    }

    /// Resolve a pending bet
    ///
    /// A win credits the frozen `potential_win` and appends a `BetPayout`;
    /// a loss only moves the status.
    ///
    /// # Errors
    ///
    /// * `LedgerError::BetNotFound`
    /// * `LedgerError::InvalidStateTransition` - bet already terminal, nothing is written
    pub async fn settle_bet(&self, bet_id: BetId, outcome: BetOutcome) -> LedgerResult<Bet> {
        debug!("settle_bet: bet={bet_id} outcome={outcome:?}");
        let bet = self
            .retry
            .run("settle_bet", || self.try_settle_bet(bet_id, outcome))
            .await?;
        info!("Bet {bet_id} settled as {}", bet.status);
        Ok(bet)
    }

    async fn try_settle_bet(&self, bet_id: BetId, outcome: BetOutcome) -> LedgerResult<Bet> {
        let status = BetStatus::from(outcome);
        let mut tx = self.store.begin().await?;

        let bet = tx.lock_bet(bet_id).await?;
        bet.ensure_transition(status)?;

        if outcome == BetOutcome::Won {
            let mut account = tx
                .lock_accounts(&[bet.account_id])
                .await?
                .pop()
                .ok_or(LedgerError::AccountNotFound(bet.account_id))?;
            account.credit_owed(bet.potential_win)?;
            tx.save_account(&account).await?;
            tx.append(&NewTransaction::completed(
                &account,
                TransactionKind::BetPayout,
                bet.potential_win,
                Some(bet.id),
                format!("Winnings for bet {}", bet.id),
            ))
            .await?;
        }

        let settled = tx.close_bet(bet_id, status).await?;
        tx.commit().await?;
        Ok(settled)
    }

    /// Cancel a pending bet and refund the stake with a `BetRefund` entry
    pub async fn cancel_bet(&self, bet_id: BetId) -> LedgerResult<Bet> {
        debug!("cancel_bet: bet={bet_id}");
        let bet = self
            .retry
            .run("cancel_bet", || self.try_cancel_bet(bet_id))
            .await?;
        info!("Bet {bet_id} cancelled, refunded {}", bet.amount);
        Ok(bet)
    }

    async fn try_cancel_bet(&self, bet_id: BetId) -> LedgerResult<Bet> {
        let mut tx = self.store.begin().await?;

        let bet = tx.lock_bet(bet_id).await?;
        bet.ensure_transition(BetStatus::Cancelled)?;

        let mut account = tx
            .lock_accounts(&[bet.account_id])
            .await?
            .pop()
            .ok_or(LedgerError::AccountNotFound(bet.account_id))?;
        account.credit_owed(bet.amount)?;
        tx.save_account(&account).await?;

        tx.append(&NewTransaction::completed(
            &account,
            TransactionKind::BetRefund,
            bet.amount,
            Some(bet.id),
            format!("Refund for cancelled bet {}", bet.id),
        ))
        .await?;

        let cancelled = tx.close_bet(bet_id, BetStatus::Cancelled).await?;
        tx.commit().await?;
        Ok(cancelled)
    }

    /// Bets of an account, newest first, optionally filtered by status
    pub async fn list_bets_by_status(
        &self,
        account_id: AccountId,
        status: Option<BetStatus>,
    ) -> LedgerResult<Vec<Bet>> {
        if self.store.find_account(account_id).await?.is_none() {
            return Err(LedgerError::AccountNotFound(account_id));
        }
        self.store.bets_for_account(account_id, status).await
    }

    pub async fn get_bet(&self, bet_id: BetId) -> LedgerResult<Bet> {
        self.store
            .find_bet(bet_id)
            .await?
            .ok_or(LedgerError::BetNotFound(bet_id))
    }

    /// Settle every pending bet on an option with the same outcome
    ///
    /// The option is closed first so no new stake lands mid-settlement. Each
    /// bet settles in its own unit of work; one that turned terminal in the
    /// meantime is counted as skipped.
    pub async fn settle_option(
        &self,
        option_id: OptionId,
        outcome: BetOutcome,
    ) -> LedgerResult<SettlementReport> {
        self.store.set_option_active(option_id, false).await?;
        let pending = self.store.pending_bets_for_option(option_id).await?;

        let mut report = SettlementReport {
            option_id,
            paid_out: Decimal::ZERO,
            ..SettlementReport::default()
        };
        for bet_id in pending {
            match self.settle_bet(bet_id, outcome).await {
                Ok(bet) if bet.status == BetStatus::Won => {
                    report.won += 1;
                    report.paid_out += bet.potential_win;
                }
                Ok(_) => report.lost += 1,
                Err(LedgerError::InvalidStateTransition { .. }) => report.skipped += 1,
                Err(err) => return Err(err),
            }
        }

        info!(
            "Option {option_id} settled: won={} lost={} skipped={} paid_out={}",
            report.won, report.lost, report.skipped, report.paid_out
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::TransactionKind;
    use crate::markets::{MarketCatalog, MatchStatus};
    use crate::store::MemoryLedgerStore;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    struct Fixture {
        store: Arc<MemoryLedgerStore>,
        engine: BetEngine,
        catalog: MarketCatalog,
        option_id: OptionId,
    }

    async fn fixture(balance: Decimal) -> Fixture {
        let store = Arc::new(MemoryLedgerStore::new());
        store.upsert_account(1, "Ana").await.unwrap();
        if balance > Decimal::ZERO {
            let mut tx = store.begin().await.unwrap();
            let mut account = tx.lock_accounts(&[1]).await.unwrap().remove(0);
            account.credit(balance).unwrap();
            tx.save_account(&account).await.unwrap();
            tx.append(&NewTransaction::completed(
                &account,
                TransactionKind::Deposit,
                balance,
                None,
                "seed",
            ))
            .await
            .unwrap();
            tx.commit().await.unwrap();
        }

        let catalog = MarketCatalog::new(store.clone(), RetryPolicy::none(), 50);
        let fixture = catalog
            .create_match("Boca", "River", Utc::now() + Duration::hours(2))
            .await
            .unwrap();
        let option = catalog.add_option(fixture.id, "home", dec!(2.00)).await.unwrap();

        Fixture {
            engine: BetEngine::new(store.clone(), RetryPolicy::none()),
            store,
            catalog,
            option_id: option.id,
        }
    }

    async fn balance(store: &MemoryLedgerStore) -> Decimal {
        store.find_account(1).await.unwrap().unwrap().balance
    }

    #[tokio::test]
    async fn test_win_pays_potential_win() {
        let f = fixture(dec!(100.00)).await;
        let bet = f.engine.place_bet(1, f.option_id, dec!(30.00)).await.unwrap();
        assert_eq!(bet.status, BetStatus::Pending);
        assert_eq!(bet.potential_win, dec!(60.00));
        assert_eq!(balance(&f.store).await, dec!(70.00));

        let settled = f.engine.settle_bet(bet.id, BetOutcome::Won).await.unwrap();
        assert_eq!(settled.status, BetStatus::Won);
        assert!(settled.settled_at.is_some());
        assert_eq!(balance(&f.store).await, dec!(130.00));
    }

    #[tokio::test]
    async fn test_loss_moves_no_money() {
        let f = fixture(dec!(50.00)).await;
        let bet = f.engine.place_bet(1, f.option_id, dec!(20.00)).await.unwrap();
        f.engine.settle_bet(bet.id, BetOutcome::Lost).await.unwrap();
        assert_eq!(balance(&f.store).await, dec!(30.00));
    }

    #[tokio::test]
    async fn test_second_settlement_is_rejected() {
        let f = fixture(dec!(100.00)).await;
        let bet = f.engine.place_bet(1, f.option_id, dec!(30.00)).await.unwrap();
        f.engine.settle_bet(bet.id, BetOutcome::Won).await.unwrap();

        let err = f.engine.settle_bet(bet.id, BetOutcome::Won).await.unwrap_err();
        assert!(matches!(err, LedgerError::InvalidStateTransition { .. }));
        assert_eq!(balance(&f.store).await, dec!(130.00));
    }

    #[tokio::test]
    async fn test_insufficient_funds_has_no_side_effects() {
        let f = fixture(dec!(10.00)).await;
        let err = f
            .engine
            .place_bet(1, f.option_id, dec!(10.01))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientFunds { .. }));
        assert_eq!(balance(&f.store).await, dec!(10.00));
        assert!(f.engine.list_bets_by_status(1, None).await.unwrap().is_empty());
        assert_eq!(f.store.transactions_for_account(1, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_closed_option_rejects_bets() {
        let f = fixture(dec!(10.00)).await;
        f.catalog.set_option_active(f.option_id, false).await.unwrap();
        let err = f.engine.place_bet(1, f.option_id, dec!(1.00)).await.unwrap_err();
        assert!(matches!(err, LedgerError::OptionInactive(_)));

        let err = f.engine.place_bet(1, 999, dec!(1.00)).await.unwrap_err();
        assert!(matches!(err, LedgerError::OptionNotFound(999)));
    }

    #[tokio::test]
    async fn test_live_match_rejects_bets() {
        let f = fixture(dec!(10.00)).await;
        let option = f.catalog.get_option(f.option_id).await.unwrap();
        f.catalog
            .set_match_status(option.match_id, MatchStatus::Live, None)
            .await
            .unwrap();
        let err = f.engine.place_bet(1, f.option_id, dec!(1.00)).await.unwrap_err();
        assert!(matches!(err, LedgerError::OptionInactive(_)));
    }

    #[tokio::test]
    async fn test_cancel_refunds_stake() {
        let f = fixture(dec!(40.00)).await;
        let bet = f.engine.place_bet(1, f.option_id, dec!(15.00)).await.unwrap();
        let cancelled = f.engine.cancel_bet(bet.id).await.unwrap();
        assert_eq!(cancelled.status, BetStatus::Cancelled);
        assert_eq!(balance(&f.store).await, dec!(40.00));

        let latest = f.store.transactions_for_account(1, 1).await.unwrap();
        assert_eq!(latest[0].kind, TransactionKind::BetRefund);
        assert_eq!(latest[0].reference_id, Some(bet.id));

        assert!(f.engine.cancel_bet(bet.id).await.is_err());
    }

    #[tokio::test]
    async fn test_odds_are_frozen_at_placement() {
        let f = fixture(dec!(10.00)).await;
        let bet = f.engine.place_bet(1, f.option_id, dec!(3.33)).await.unwrap();
        assert_eq!(bet.odds, dec!(2.00));
        assert_eq!(bet.potential_win, dec!(6.66));
    }

    #[tokio::test]
    async fn test_settle_option_settles_every_pending_bet() {
        let f = fixture(dec!(100.00)).await;
        let first = f.engine.place_bet(1, f.option_id, dec!(10.00)).await.unwrap();
        f.engine.place_bet(1, f.option_id, dec!(5.00)).await.unwrap();
        f.engine.cancel_bet(first.id).await.unwrap();

        let report = f.engine.settle_option(f.option_id, BetOutcome::Won).await.unwrap();
        assert_eq!(report.won, 1);
        assert_eq!(report.paid_out, dec!(10.00));
        assert_eq!(balance(&f.store).await, dec!(105.00));
        assert!(!f.catalog.get_option(f.option_id).await.unwrap().active);
    }
}
