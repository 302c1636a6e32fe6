//! Audit ledger data models.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::accounts::{Account, AccountId};
use crate::errors::LedgerError;

/// Transaction ID type
pub type TransactionId = i64;

/// Kind of balance-affecting event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Deposit,
    Withdrawal,
    BetStake,
    BetPayout,
    BetRefund,
    TransferOut,
    TransferIn,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Deposit => "deposit",
            TransactionKind::Withdrawal => "withdrawal",
            TransactionKind::BetStake => "bet_stake",
            TransactionKind::BetPayout => "bet_payout",
            TransactionKind::BetRefund => "bet_refund",
            TransactionKind::TransferOut => "transfer_out",
            TransactionKind::TransferIn => "transfer_in",
        }
    }

    /// Whether the entry adds funds to the account.
    pub fn is_credit(&self) -> bool {
        matches!(
            self,
            TransactionKind::Deposit
                | TransactionKind::BetPayout
                | TransactionKind::BetRefund
                | TransactionKind::TransferIn
        )
    }

    /// Apply the kind's sign to a positive magnitude.
    pub fn signed(&self, magnitude: Decimal) -> Decimal {
        if self.is_credit() {
            magnitude
        } else {
            -magnitude
        }
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionKind {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deposit" => Ok(TransactionKind::Deposit),
            "withdrawal" => Ok(TransactionKind::Withdrawal),
            "bet_stake" => Ok(TransactionKind::BetStake),
            "bet_payout" => Ok(TransactionKind::BetPayout),
            "bet_refund" => Ok(TransactionKind::BetRefund),
            "transfer_out" => Ok(TransactionKind::TransferOut),
            "transfer_in" => Ok(TransactionKind::TransferIn),
            other => Err(LedgerError::Storage(format!(
                "unknown transaction kind '{other}'"
            ))),
        }
    }
}

/// Kinds a user may request through the approval workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    Deposit,
    Withdrawal,
}

impl From<RequestKind> for TransactionKind {
    fn from(kind: RequestKind) -> Self {
        match kind {
            RequestKind::Deposit => TransactionKind::Deposit,
            RequestKind::Withdrawal => TransactionKind::Withdrawal,
        }
    }
}

/// Transaction status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Approved,
    Rejected,
    Completed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Approved => "approved",
            TransactionStatus::Rejected => "rejected",
            TransactionStatus::Completed => "completed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TransactionStatus::Pending),
            "approved" => Ok(TransactionStatus::Approved),
            "rejected" => Ok(TransactionStatus::Rejected),
            "completed" => Ok(TransactionStatus::Completed),
            other => Err(LedgerError::Storage(format!(
                "unknown transaction status '{other}'"
            ))),
        }
    }
}

/// Audit entry (one balance-affecting event, or a pending request)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub account_id: AccountId,
    /// Signed: credits positive, debits negative
    pub amount: Decimal,
    pub kind: TransactionKind,
    pub status: TransactionStatus,
    pub balance_after: Option<Decimal>,
    /// Bet id or transfer id the entry belongs to
    pub reference_id: Option<i64>,
    pub description: Option<String>,
    pub admin_id: Option<AccountId>,
    pub proof_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl Transaction {
    /// Unsigned amount.
    pub fn magnitude(&self) -> Decimal {
        self.amount.abs()
    }

    /// Entry that moved money (as opposed to a pending or rejected request).
    pub fn is_applied(&self) -> bool {
        matches!(
            self.status,
            TransactionStatus::Completed | TransactionStatus::Approved
        )
    }
}

/// Row to append to the audit ledger
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    pub account_id: AccountId,
    pub amount: Decimal,
    pub kind: TransactionKind,
    pub status: TransactionStatus,
    pub balance_after: Option<Decimal>,
    pub reference_id: Option<i64>,
    pub description: Option<String>,
    pub proof_ref: Option<String>,
}

impl NewTransaction {
    /// Entry for a movement already applied to `account`.
    pub fn completed(
        account: &Account,
        kind: TransactionKind,
        magnitude: Decimal,
        reference_id: Option<i64>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            account_id: account.id,
            amount: kind.signed(magnitude),
            kind,
            status: TransactionStatus::Completed,
            balance_after: Some(account.balance),
            reference_id,
            description: Some(description.into()),
            proof_ref: None,
        }
    }

    /// Deposit/withdrawal intent with no balance effect yet.
    pub fn request(
        account_id: AccountId,
        kind: RequestKind,
        magnitude: Decimal,
        proof_ref: Option<String>,
    ) -> Self {
        let kind = TransactionKind::from(kind);
        Self {
            account_id,
            amount: kind.signed(magnitude),
            kind,
            status: TransactionStatus::Pending,
            balance_after: None,
            reference_id: None,
            description: None,
            proof_ref,
        }
    }
}

/// Terminal resolution of a pending request
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub status: TransactionStatus,
    pub admin_id: AccountId,
    pub balance_after: Option<Decimal>,
    pub description: Option<String>,
}
