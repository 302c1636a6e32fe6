//! # Sportsbook Ledger
//!
//! Account ledger engine for a sports betting chat bot: per-user balances,
//! bet lifecycle, peer-to-peer transfers and admin-approved deposits and
//! withdrawals, kept consistent under concurrent access.
//!
//! ## Guarantees
//!
//! - A balance never goes negative.
//! - A bet settles at most once; terminal states never change.
//! - Every balance change writes exactly one audit entry in the same unit of
//!   work, and the entries of an account sum to its balance.
//! - Concurrent operations on the same account are linearised with
//!   exclusive per-account locks taken in ascending id order. Lock waits are
//!   bounded and surface as the retryable [`LedgerError::ConcurrencyConflict`].
//!
//! ## Core Modules
//!
//! - [`store`]: storage backends (PostgreSQL and in-process) behind one unit-of-work trait
//! - [`accounts`], [`audit`], [`markets`]: balances, audit entries, matches and options
//! - [`betting`], [`transfers`], [`approvals`]: the money-moving workflows
//! - [`Ledger`]: facade wiring every service over one store
//!
//! ## Example
//!
//! ```
//! use chrono::{Duration, Utc};
//! use rust_decimal_macros::dec;
//! use sportsbook_ledger::{BetOutcome, Ledger, LedgerConfig, RequestKind};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), sportsbook_ledger::LedgerError> {
//! let ledger = Ledger::in_memory(&LedgerConfig::default());
//! ledger.accounts().open_account(1, "Ana").await?;
//! ledger.accounts().open_account(99, "Ops").await?;
//! ledger.accounts().set_admin(99, true).await?;
//!
//! let deposit = ledger
//!     .create_transaction_request(1, RequestKind::Deposit, dec!(100.00), None)
//!     .await?;
//! ledger.approve_transaction(deposit.id, 99).await?;
//!
//! let fixture = ledger
//!     .markets()
//!     .create_match("Boca", "River", Utc::now() + Duration::hours(2))
//!     .await?;
//! let home = ledger.markets().add_option(fixture.id, "Boca", dec!(2.00)).await?;
//!
//! let bet = ledger.place_bet(1, home.id, dec!(30.00)).await?;
//! assert_eq!(ledger.get_balance(1).await?, dec!(70.00));
//!
//! ledger.settle_bet(bet.id, BetOutcome::Won).await?;
//! assert_eq!(ledger.get_balance(1).await?, dec!(130.00));
//! # Ok(())
//! # }
//! ```

pub mod accounts;
pub mod approvals;
pub mod audit;
pub mod betting;
pub mod config;
pub mod db;
pub mod errors;
pub mod markets;
pub mod money;
pub mod retry;
pub mod store;
pub mod transfers;

mod ledger;

pub use accounts::{Account, AccountId};
pub use audit::{RequestKind, Transaction, TransactionId, TransactionKind, TransactionStatus};
pub use betting::{Bet, BetId, BetOutcome, BetStatus, SettlementReport};
pub use config::{ConfigError, LedgerConfig};
pub use errors::{LedgerError, LedgerResult};
pub use ledger::Ledger;
pub use markets::{BetOption, Match, MatchId, MatchStatus, OptionId};
pub use transfers::{Transfer, TransferDirection, TransferId};
