//! Match and bet option models.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::errors::LedgerError;

/// Match ID type
pub type MatchId = i64;

/// Bet option ID type
pub type OptionId = i64;

/// Match status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Scheduled,
    Live,
    Finished,
    Cancelled,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Scheduled => "scheduled",
            MatchStatus::Live => "live",
            MatchStatus::Finished => "finished",
            MatchStatus::Cancelled => "cancelled",
        }
    }

    /// Scheduled -> Live -> Finished, with Cancelled reachable until finished.
    pub fn can_move_to(&self, to: MatchStatus) -> bool {
        matches!(
            (self, to),
            (MatchStatus::Scheduled, MatchStatus::Live)
                | (MatchStatus::Scheduled, MatchStatus::Finished)
                | (MatchStatus::Scheduled, MatchStatus::Cancelled)
                | (MatchStatus::Live, MatchStatus::Finished)
                | (MatchStatus::Live, MatchStatus::Cancelled)
        )
    }
}

impl std::fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(MatchStatus::Scheduled),
            "live" => Ok(MatchStatus::Live),
            "finished" => Ok(MatchStatus::Finished),
            "cancelled" => Ok(MatchStatus::Cancelled),
            other => Err(LedgerError::Storage(format!(
                "unknown match status '{other}'"
            ))),
        }
    }
}

/// Match model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub id: MatchId,
    pub home_team: String,
    pub away_team: String,
    pub starts_at: DateTime<Utc>,
    pub status: MatchStatus,
    pub result: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Priced prediction on a match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BetOption {
    pub id: OptionId,
    pub match_id: MatchId,
    pub prediction: String,
    pub odds: Decimal,
    pub active: bool,
}

impl BetOption {
    /// Open for new bets: option active, match still scheduled and not kicked off.
    pub fn is_open(&self, fixture: &Match, now: DateTime<Utc>) -> bool {
        self.active && fixture.status == MatchStatus::Scheduled && fixture.starts_at > now
    }
}

/// Match to create
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMatch {
    pub home_team: String,
    pub away_team: String,
    pub starts_at: DateTime<Utc>,
}

/// Option to create
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewBetOption {
    pub match_id: MatchId,
    pub prediction: String,
    pub odds: Decimal,
}
