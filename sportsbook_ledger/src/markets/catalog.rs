//! Market catalog: matches and bet options.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, info};
use rust_decimal::Decimal;

use super::models::{BetOption, Match, MatchId, MatchStatus, NewBetOption, NewMatch, OptionId};
use crate::errors::{LedgerError, LedgerResult};
use crate::money::{MONEY_SCALE, to_money};
use crate::retry::RetryPolicy;
use crate::store::LedgerStore;

/// Highest odds accepted for an option
pub const MAX_ODDS: Decimal = Decimal::from_parts(100_000, 0, 0, false, 2);

/// Validate decimal odds: strictly above 1.00, at most two decimal places.
pub fn validate_odds(odds: Decimal) -> LedgerResult<Decimal> {
    if odds <= Decimal::ONE || odds > MAX_ODDS || odds.normalize().scale() > MONEY_SCALE {
        return Err(LedgerError::InvalidOdds(odds));
    }
    Ok(to_money(odds))
}

fn required(field: &str, value: &str) -> LedgerResult<String> {
    match value.trim() {
        "" => Err(LedgerError::InvalidInput(format!("{field} must not be blank"))),
        trimmed => Ok(trimmed.to_string()),
    }
}

/// Market catalog
#[derive(Clone)]
pub struct MarketCatalog {
    store: Arc<dyn LedgerStore>,
    retry: RetryPolicy,
    history_limit: i64,
}

impl MarketCatalog {
    pub fn new(store: Arc<dyn LedgerStore>, retry: RetryPolicy, history_limit: i64) -> Self {
        Self {
            store,
            retry,
            history_limit,
        }
    }

    /// Schedule a match
    pub async fn create_match(
        &self,
        home_team: &str,
        away_team: &str,
        starts_at: DateTime<Utc>,
    ) -> LedgerResult<Match> {
        let new = NewMatch {
            home_team: required("home_team", home_team)?,
            away_team: required("away_team", away_team)?,
            starts_at,
        };
        let fixture = self.store.insert_match(&new).await?;
        info!(
            "Match {} scheduled: {} vs {} at {}",
            fixture.id, fixture.home_team, fixture.away_team, fixture.starts_at
        );
        Ok(fixture)
    }

    pub async fn get_match(&self, id: MatchId) -> LedgerResult<Match> {
        self.store
            .find_match(id)
            .await?
            .ok_or(LedgerError::MatchNotFound(id))
    }

    /// Matches still open for betting (scheduled, not yet started), soonest first
    ///
    /// `limit` is capped at the configured history limit; zero or a negative
    /// limit yields an empty list.
    pub async fn upcoming_matches(&self, limit: i64) -> LedgerResult<Vec<Match>> {
        if limit <= 0 {
            return Ok(Vec::new());
        }
        self.store
            .upcoming_matches(limit.min(self.history_limit))
            .await
    }

    /// Move a match forward; leaving `Scheduled` closes all its options
    ///
    /// # Errors
    ///
    /// * `LedgerError::MatchNotFound` - unknown match
    /// * `LedgerError::InvalidStateTransition` - backwards or from a final state
    pub async fn set_match_status(
        &self,
        id: MatchId,
        status: MatchStatus,
        result: Option<&str>,
    ) -> LedgerResult<Match> {
        let current = self.get_match(id).await?;
        if !current.status.can_move_to(status) {
            return Err(LedgerError::invalid_transition(
                "match",
                current.status,
                status,
            ));
        }
        let fixture = self
            .retry
            .run("set_match_status", || {
                self.store.update_match_status(id, status, result)
            })
            .await?;
        info!("Match {id}: {} -> {status}", current.status);
        Ok(fixture)
    }

    /// Add a priced option to an existing match
    pub async fn add_option(
        &self,
        match_id: MatchId,
        prediction: &str,
        odds: Decimal,
    ) -> LedgerResult<BetOption> {
        let new = NewBetOption {
            match_id,
            prediction: required("prediction", prediction)?,
            odds: validate_odds(odds)?,
        };
        let option = self.store.insert_option(&new).await?;
        debug!(
            "Option {} on match {match_id}: {} @ {}",
            option.id, option.prediction, option.odds
        );
        Ok(option)
    }

    pub async fn get_option(&self, id: OptionId) -> LedgerResult<BetOption> {
        self.store
            .find_option(id)
            .await?
            .ok_or(LedgerError::OptionNotFound(id))
    }

    /// Options of a match, ordered by id
    pub async fn options_for_match(
        &self,
        match_id: MatchId,
        active_only: bool,
    ) -> LedgerResult<Vec<BetOption>> {
        self.get_match(match_id).await?;
        self.store.options_for_match(match_id, active_only).await
    }

    /// Open or close an option for new bets; pending bets are unaffected
    pub async fn set_option_active(&self, id: OptionId, active: bool) -> LedgerResult<BetOption> {
        let option = self
            .retry
            .run("set_option_active", || self.store.set_option_active(id, active))
            .await?;
        info!("Option {id} active={active}");
        Ok(option)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::{Account, AccountId};
    use crate::audit::{Transaction, TransactionId};
    use crate::betting::{Bet, BetId, BetStatus};
    use crate::store::{LedgerTx, MemoryLedgerStore};
    use crate::transfers::{Transfer, TransferDirection, TransferId};
    use async_trait::async_trait;
    use chrono::Duration;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicU32, Ordering as AtomicOrdering};

    fn catalog() -> MarketCatalog {
        MarketCatalog::new(Arc::new(MemoryLedgerStore::new()), RetryPolicy::none(), 3)
    }

    /// Memory store whose catalog writes lose a lock race a set number of times
    struct ContendedStore {
        inner: MemoryLedgerStore,
        conflicts: AtomicU32,
    }

    impl ContendedStore {
        fn new(conflicts: u32) -> Self {
            Self {
                inner: MemoryLedgerStore::new(),
                conflicts: AtomicU32::new(conflicts),
            }
        }

        fn contend(&self) -> LedgerResult<()> {
            let remaining = self.conflicts.load(AtomicOrdering::SeqCst);
            if remaining > 0 {
                self.conflicts.store(remaining - 1, AtomicOrdering::SeqCst);
                return Err(LedgerError::ConcurrencyConflict("deadlock detected".into()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl LedgerStore for ContendedStore {
        async fn begin(&self) -> LedgerResult<Box<dyn LedgerTx>> {
            self.inner.begin().await
        }
        async fn ping(&self) -> LedgerResult<()> {
            self.inner.ping().await
        }
        async fn upsert_account(&self, id: AccountId, name: &str) -> LedgerResult<Account> {
            self.inner.upsert_account(id, name).await
        }
        async fn find_account(&self, id: AccountId) -> LedgerResult<Option<Account>> {
            self.inner.find_account(id).await
        }
        async fn insert_match(&self, new: &NewMatch) -> LedgerResult<Match> {
            self.inner.insert_match(new).await
        }
        async fn find_match(&self, id: MatchId) -> LedgerResult<Option<Match>> {
            self.inner.find_match(id).await
        }
        async fn upcoming_matches(&self, limit: i64) -> LedgerResult<Vec<Match>> {
            self.inner.upcoming_matches(limit).await
        }
        async fn update_match_status(
            &self,
            id: MatchId,
            status: MatchStatus,
            result: Option<&str>,
        ) -> LedgerResult<Match> {
            self.contend()?;
            self.inner.update_match_status(id, status, result).await
        }
        async fn insert_option(&self, new: &NewBetOption) -> LedgerResult<BetOption> {
            self.inner.insert_option(new).await
        }
        async fn find_option(&self, id: OptionId) -> LedgerResult<Option<BetOption>> {
            self.inner.find_option(id).await
        }
        async fn options_for_match(
            &self,
            match_id: MatchId,
            active_only: bool,
        ) -> LedgerResult<Vec<BetOption>> {
            self.inner.options_for_match(match_id, active_only).await
        }
        async fn set_option_active(&self, id: OptionId, active: bool) -> LedgerResult<BetOption> {
            self.contend()?;
            self.inner.set_option_active(id, active).await
        }
        async fn find_bet(&self, id: BetId) -> LedgerResult<Option<Bet>> {
            self.inner.find_bet(id).await
        }
        async fn bets_for_account(
            &self,
            account_id: AccountId,
            status: Option<BetStatus>,
        ) -> LedgerResult<Vec<Bet>> {
            self.inner.bets_for_account(account_id, status).await
        }
        async fn pending_bets_for_option(&self, option_id: OptionId) -> LedgerResult<Vec<BetId>> {
            self.inner.pending_bets_for_option(option_id).await
        }
        async fn find_transaction(&self, id: TransactionId) -> LedgerResult<Option<Transaction>> {
            self.inner.find_transaction(id).await
        }
        async fn transactions_for_account(
            &self,
            account_id: AccountId,
            limit: i64,
        ) -> LedgerResult<Vec<Transaction>> {
            self.inner.transactions_for_account(account_id, limit).await
        }
        async fn pending_requests(&self) -> LedgerResult<Vec<Transaction>> {
            self.inner.pending_requests().await
        }
        async fn find_transfer(&self, id: TransferId) -> LedgerResult<Option<Transfer>> {
            self.inner.find_transfer(id).await
        }
        async fn transfers_for_account(
            &self,
            account_id: AccountId,
            direction: TransferDirection,
            limit: i64,
        ) -> LedgerResult<Vec<Transfer>> {
            self.inner
                .transfers_for_account(account_id, direction, limit)
                .await
        }
    }

    fn fast_retry(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: std::time::Duration::from_millis(1),
        }
    }

    #[test]
    fn test_validate_odds() {
        assert_eq!(validate_odds(dec!(1.5)).unwrap(), dec!(1.50));
        assert!(validate_odds(dec!(1.00)).is_err());
        assert!(validate_odds(dec!(0.50)).is_err());
        assert!(validate_odds(dec!(2.125)).is_err());
        assert!(validate_odds(dec!(1000.01)).is_err());
    }

    #[tokio::test]
    async fn test_blank_names_rejected() {
        let err = catalog()
            .create_match(" ", "River", Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_option_requires_match() {
        let err = catalog().add_option(5, "home", dec!(2.00)).await.unwrap_err();
        assert!(matches!(err, LedgerError::MatchNotFound(5)));
    }

    #[tokio::test]
    async fn test_leaving_scheduled_closes_options() {
        let catalog = catalog();
        let fixture = catalog
            .create_match("Boca", "River", Utc::now() + Duration::hours(3))
            .await
            .unwrap();
        catalog.add_option(fixture.id, "home", dec!(2.10)).await.unwrap();
        catalog.add_option(fixture.id, "draw", dec!(3.20)).await.unwrap();
        assert_eq!(catalog.options_for_match(fixture.id, true).await.unwrap().len(), 2);

        let live = catalog
            .set_match_status(fixture.id, MatchStatus::Live, None)
            .await
            .unwrap();
        assert_eq!(live.status, MatchStatus::Live);
        assert!(catalog.options_for_match(fixture.id, true).await.unwrap().is_empty());
        assert_eq!(catalog.options_for_match(fixture.id, false).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_match_cannot_move_backwards() {
        let catalog = catalog();
        let fixture = catalog
            .create_match("Boca", "River", Utc::now() + Duration::hours(3))
            .await
            .unwrap();
        catalog
            .set_match_status(fixture.id, MatchStatus::Finished, Some("2-1"))
            .await
            .unwrap();

        let err = catalog
            .set_match_status(fixture.id, MatchStatus::Live, None)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidStateTransition { .. }));
        assert_eq!(
            catalog.get_match(fixture.id).await.unwrap().result.as_deref(),
            Some("2-1")
        );
    }

    #[tokio::test]
    async fn test_upcoming_matches_soonest_first() {
        let catalog = catalog();
        let now = Utc::now();
        let late = catalog
            .create_match("Racing", "Independiente", now + Duration::hours(5))
            .await
            .unwrap();
        let soon = catalog
            .create_match("Boca", "River", now + Duration::hours(1))
            .await
            .unwrap();
        catalog
            .create_match("Lanus", "Banfield", now - Duration::hours(1))
            .await
            .unwrap();
        let live = catalog
            .create_match("Velez", "Huracan", now + Duration::hours(2))
            .await
            .unwrap();
        catalog
            .set_match_status(live.id, MatchStatus::Live, None)
            .await
            .unwrap();

        let upcoming = catalog.upcoming_matches(10).await.unwrap();
        let ids: Vec<_> = upcoming.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![soon.id, late.id]);

        assert_eq!(catalog.upcoming_matches(1).await.unwrap()[0].id, soon.id);
        assert!(catalog.upcoming_matches(0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upcoming_matches_capped_by_history_limit() {
        let catalog = catalog();
        for hours in 1..=5 {
            catalog
                .create_match("Boca", "River", Utc::now() + Duration::hours(hours))
                .await
                .unwrap();
        }
        assert_eq!(catalog.upcoming_matches(100).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_catalog_writes_retry_lock_conflicts() {
        let store = Arc::new(ContendedStore::new(0));
        let catalog = MarketCatalog::new(store.clone(), fast_retry(2), 50);
        let fixture = catalog
            .create_match("Boca", "River", Utc::now() + Duration::hours(1))
            .await
            .unwrap();
        let option = catalog.add_option(fixture.id, "home", dec!(2.00)).await.unwrap();

        store.conflicts.store(2, AtomicOrdering::SeqCst);
        let closed = catalog.set_option_active(option.id, false).await.unwrap();
        assert!(!closed.active);

        store.conflicts.store(2, AtomicOrdering::SeqCst);
        let live = catalog
            .set_match_status(fixture.id, MatchStatus::Live, None)
            .await
            .unwrap();
        assert_eq!(live.status, MatchStatus::Live);

        store.conflicts.store(3, AtomicOrdering::SeqCst);
        let err = catalog
            .set_match_status(fixture.id, MatchStatus::Finished, None)
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }
}
