//! Mapping from ledger errors to HTTP responses.
//!
//! Every failure leaves the server as JSON:
//!
//! ```json
//! { "error": "Insufficient funds", "code": "insufficient_funds" }
//! ```

use axum::{Json, http::StatusCode};
use serde::{Deserialize, Serialize};
use sportsbook_ledger::LedgerError;

use crate::{logging, metrics};

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// Error half of every handler result
pub type ApiError = (StatusCode, Json<ErrorResponse>);

/// Result type for handlers
pub type ApiResult<T> = Result<Json<T>, ApiError>;

/// HTTP status for a ledger error
///
/// | status | errors |
/// |--------|--------|
/// | 400 | malformed amount, odds or input, self transfer |
/// | 403 | caller is not an administrator |
/// | 404 | unknown account, bet, transaction, option or match |
/// | 409 | transition from a non-eligible state |
/// | 422 | insufficient funds, closed option, inactive account |
/// | 503 | lock contention that outlasted the retries |
/// | 500 | storage failures |
pub fn status_for(err: &LedgerError) -> StatusCode {
    match err {
        LedgerError::InvalidAmount(_)
        | LedgerError::InvalidOdds(_)
        | LedgerError::InvalidInput(_)
        | LedgerError::SelfTransfer => StatusCode::BAD_REQUEST,
        LedgerError::NotAdmin(_) => StatusCode::FORBIDDEN,
        e if e.is_not_found() => StatusCode::NOT_FOUND,
        LedgerError::InvalidStateTransition { .. } => StatusCode::CONFLICT,
        LedgerError::InsufficientFunds { .. }
        | LedgerError::OptionInactive(_)
        | LedgerError::AccountInactive(_) => StatusCode::UNPROCESSABLE_ENTITY,
        LedgerError::ConcurrencyConflict(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Convert a ledger error into the handler error, counting it by code
pub fn ledger_error(operation: &'static str) -> impl Fn(LedgerError) -> ApiError {
    move |err| {
        let code = err.code();
        let message = err.client_message();
        if let LedgerError::Database(_) | LedgerError::Storage(_) = err {
            tracing::error!(operation = operation, "Ledger storage failure: {}", err);
        }
        logging::log_ledger_error(operation, code, &message);
        metrics::ledger_errors_total(code);

        (
            status_for(&err),
            Json(ErrorResponse {
                error: message,
                code: code.to_string(),
            }),
        )
    }
}

/// A request the handler rejects before reaching the ledger
pub fn bad_request(message: impl Into<String>) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.into(),
            code: "invalid_input".to_string(),
        }),
    )
}
