//! Append-only audit ledger.
//!
//! Every balance change is recorded as exactly one [`Transaction`] written in
//! the same unit of work as the change. Rows are never deleted; the only
//! update is resolving a pending deposit/withdrawal request.

pub mod ledger;
pub mod models;

pub use ledger::AuditLedger;
pub use models::{
    NewTransaction, RequestKind, Resolution, Transaction, TransactionId, TransactionKind,
    TransactionStatus,
};
