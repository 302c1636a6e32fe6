//! Bet data models.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::accounts::AccountId;
use crate::errors::{LedgerError, LedgerResult};
use crate::markets::OptionId;

/// Bet ID type
pub type BetId = i64;

/// Bet lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BetStatus {
    Pending,
    Won,
    Lost,
    Cancelled,
}

impl BetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BetStatus::Pending => "pending",
            BetStatus::Won => "won",
            BetStatus::Lost => "lost",
            BetStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, BetStatus::Pending)
    }
}

impl std::fmt::Display for BetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BetStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BetStatus::Pending),
            "won" => Ok(BetStatus::Won),
            "lost" => Ok(BetStatus::Lost),
            "cancelled" => Ok(BetStatus::Cancelled),
            other => Err(LedgerError::Storage(format!("unknown bet status '{other}'"))),
        }
    }
}

/// Settlement outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BetOutcome {
    Won,
    Lost,
}

impl From<BetOutcome> for BetStatus {
    fn from(outcome: BetOutcome) -> Self {
        match outcome {
            BetOutcome::Won => BetStatus::Won,
            BetOutcome::Lost => BetStatus::Lost,
        }
    }
}

/// Bet model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bet {
    pub id: BetId,
    pub account_id: AccountId,
    pub option_id: OptionId,
    pub amount: Decimal,
    /// Odds snapshotted at placement
    pub odds: Decimal,
    /// Frozen at placement; later odds changes never alter the payout
    pub potential_win: Decimal,
    pub status: BetStatus,
    pub created_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
}

impl Bet {
    /// Check that `Pending -> to` is a legal move.
    pub fn ensure_transition(&self, to: BetStatus) -> LedgerResult<()> {
        match (self.status, to) {
            (BetStatus::Pending, BetStatus::Won | BetStatus::Lost | BetStatus::Cancelled) => Ok(()),
            (from, to) => Err(LedgerError::invalid_transition("bet", from, to)),
        }
    }
}

/// Bet row to insert
#[derive(Debug, Clone, PartialEq)]
pub struct NewBet {
    pub account_id: AccountId,
    pub option_id: OptionId,
    pub amount: Decimal,
    pub odds: Decimal,
    pub potential_win: Decimal,
}

/// Result of settling every pending bet on an option
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettlementReport {
    pub option_id: OptionId,
    pub won: usize,
    pub lost: usize,
    /// Bets that turned terminal between listing and settling
    pub skipped: usize,
    pub paid_out: Decimal,
}
