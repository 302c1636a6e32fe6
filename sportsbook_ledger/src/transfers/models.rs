//! Transfer data models.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::accounts::AccountId;

/// Transfer ID type
pub type TransferId = i64;

/// Peer-to-peer movement of funds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transfer {
    pub id: TransferId,
    pub sender_id: AccountId,
    pub receiver_id: AccountId,
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Transfer row to insert
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransfer {
    pub sender_id: AccountId,
    pub receiver_id: AccountId,
    pub amount: Decimal,
}

/// Which side of a transfer an account was on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferDirection {
    Sent,
    Received,
    #[default]
    All,
}

impl TransferDirection {
    pub fn matches(&self, transfer: &Transfer, account_id: AccountId) -> bool {
        match self {
            TransferDirection::Sent => transfer.sender_id == account_id,
            TransferDirection::Received => transfer.receiver_id == account_id,
            TransferDirection::All => {
                transfer.sender_id == account_id || transfer.receiver_id == account_id
            }
        }
    }
}
