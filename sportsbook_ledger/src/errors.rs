//! Ledger error types.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::accounts::AccountId;
use crate::audit::TransactionId;
use crate::betting::BetId;
use crate::markets::{MatchId, OptionId};

/// SQLSTATE codes that signal lock or serialization contention.
///
/// * `40001` - serialization_failure
/// * `40P01` - deadlock_detected
/// * `55P03` - lock_not_available (raised when `lock_timeout` expires)
const CONTENTION_SQLSTATES: [&str; 3] = ["40001", "40P01", "55P03"];

/// Ledger errors
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Non-positive or malformed amount
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Debit would take the balance below zero
    #[error("Insufficient funds in account {account_id}: available {available}, required {required}")]
    InsufficientFunds {
        account_id: AccountId,
        available: Decimal,
        required: Decimal,
    },

    /// Account not found
    #[error("Account {0} not found")]
    AccountNotFound(AccountId),

    /// Bet not found
    #[error("Bet {0} not found")]
    BetNotFound(BetId),

    /// Transaction not found
    #[error("Transaction {0} not found")]
    TransactionNotFound(TransactionId),

    /// Bet option not found
    #[error("Bet option {0} not found")]
    OptionNotFound(OptionId),

    /// Match not found
    #[error("Match {0} not found")]
    MatchNotFound(MatchId),

    /// Attempted transition from a non-eligible state
    #[error("Invalid {entity} transition: {from} -> {to}")]
    InvalidStateTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    /// Sender and receiver are the same account
    #[error("Cannot transfer funds to the same account")]
    SelfTransfer,

    /// Bet option is closed for betting
    #[error("Bet option {0} is not open for betting")]
    OptionInactive(OptionId),

    /// Account has been deactivated
    #[error("Account {0} is inactive")]
    AccountInactive(AccountId),

    /// Caller is not an active administrator
    #[error("Account {0} is not an administrator")]
    NotAdmin(AccountId),

    /// Malformed catalog input (blank team or prediction)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Odds must be greater than 1.00
    #[error("Invalid odds: {0}")]
    InvalidOdds(Decimal),

    /// Lock or serialization contention; retrying with the same inputs is safe
    #[error("Concurrency conflict: {0}")]
    ConcurrencyConflict(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    /// Stored data could not be interpreted, or the store is unusable
    #[error("Storage error: {0}")]
    Storage(String),
}

impl LedgerError {
    /// True for every "unknown reference" variant.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            LedgerError::AccountNotFound(_)
                | LedgerError::BetNotFound(_)
                | LedgerError::TransactionNotFound(_)
                | LedgerError::OptionNotFound(_)
                | LedgerError::MatchNotFound(_)
        )
    }

    /// Only contention is retryable: no partial effect was committed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::ConcurrencyConflict(_))
    }

    /// Stable machine-readable code, used by the HTTP layer and metrics.
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::InvalidAmount(_) => "invalid_amount",
            LedgerError::InsufficientFunds { .. } => "insufficient_funds",
            LedgerError::AccountNotFound(_)
            | LedgerError::BetNotFound(_)
            | LedgerError::TransactionNotFound(_)
            | LedgerError::OptionNotFound(_)
            | LedgerError::MatchNotFound(_) => "not_found",
            LedgerError::InvalidStateTransition { .. } => "invalid_state_transition",
            LedgerError::SelfTransfer => "self_transfer",
            LedgerError::OptionInactive(_) => "option_inactive",
            LedgerError::AccountInactive(_) => "account_inactive",
            LedgerError::NotAdmin(_) => "not_admin",
            LedgerError::InvalidInput(_) => "invalid_input",
            LedgerError::InvalidOdds(_) => "invalid_odds",
            LedgerError::ConcurrencyConflict(_) => "concurrency_conflict",
            LedgerError::Database(_) | LedgerError::Storage(_) => "internal",
        }
    }

    /// Get a client-safe error message that doesn't leak sensitive information
    ///
    /// Database and storage errors are sanitized so SQL details never reach
    /// the chat front-end.
    pub fn client_message(&self) -> String {
        match self {
            LedgerError::Database(_) | LedgerError::Storage(_) => {
                "Internal server error".to_string()
            }
            LedgerError::ConcurrencyConflict(_) => {
                "The ledger is busy, please try again".to_string()
            }
            LedgerError::InsufficientFunds { .. } => "Insufficient funds".to_string(),
            _ => self.to_string(),
        }
    }

    pub(crate) fn invalid_transition(
        entity: &'static str,
        from: impl ToString,
        to: impl ToString,
    ) -> Self {
        LedgerError::InvalidStateTransition {
            entity,
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        let contended = err
            .as_database_error()
            .and_then(|db| db.code())
            .is_some_and(|code| CONTENTION_SQLSTATES.iter().any(|state| *state == code));

        if contended {
            LedgerError::ConcurrencyConflict(err.to_string())
        } else {
            LedgerError::Database(err)
        }
    }
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_not_found_variants() {
        assert!(LedgerError::AccountNotFound(1).is_not_found());
        assert!(LedgerError::BetNotFound(1).is_not_found());
        assert!(LedgerError::TransactionNotFound(1).is_not_found());
        assert!(!LedgerError::SelfTransfer.is_not_found());
        assert_eq!(LedgerError::OptionNotFound(3).code(), "not_found");
    }

    #[test]
    fn test_only_conflicts_are_retryable() {
        assert!(LedgerError::ConcurrencyConflict("lock".into()).is_retryable());
        assert!(!LedgerError::SelfTransfer.is_retryable());
        assert!(
            !LedgerError::InsufficientFunds {
                account_id: 1,
                available: dec!(1),
                required: dec!(2),
            }
            .is_retryable()
        );
    }

    #[test]
    fn test_client_message_sanitizes_internals() {
        let err = LedgerError::Database(sqlx::Error::RowNotFound);
        assert_eq!(err.client_message(), "Internal server error");

        let err = LedgerError::Storage("poisoned".into());
        assert_eq!(err.client_message(), "Internal server error");

        let err = LedgerError::InsufficientFunds {
            account_id: 42,
            available: dec!(10.00),
            required: dec!(20.00),
        };
        assert!(!err.client_message().contains("42"));
    }

    #[test]
    fn test_plain_sqlx_error_is_not_a_conflict() {
        let err: LedgerError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, LedgerError::Database(_)));
    }

    #[test]
    fn test_invalid_transition_display() {
        let err = LedgerError::invalid_transition("bet", "won", "won");
        assert_eq!(err.to_string(), "Invalid bet transition: won -> won");
        assert_eq!(err.code(), "invalid_state_transition");
    }
}
