//! Deposit and withdrawal request handlers.
//!
//! Requests are created `pending` with no balance effect; an administrator
//! approves or rejects each one exactly once.
//!
//! # Examples
//!
//! Request a deposit with a receipt reference:
//! ```bash
//! curl -X POST http://localhost:6969/api/v1/transactions \
//!   -H "Content-Type: application/json" \
//!   -d '{"account_id": 42, "kind": "deposit", "amount": "100.00", "proof_ref": "receipt-881"}'
//! ```
//!
//! Approve it:
//! ```bash
//! curl -X POST http://localhost:6969/api/v1/transactions/5/approve \
//!   -H "Content-Type: application/json" \
//!   -d '{"admin_id": 1}'
//! ```

use axum::{
    Json,
    extract::{Path, State},
};
use rust_decimal::Decimal;
use serde::Deserialize;
use sportsbook_ledger::{AccountId, RequestKind, Transaction, TransactionId};

use super::AppState;
use super::error::{ApiResult, ledger_error};
use super::request_id::RequestId;
use crate::metrics;

#[derive(Debug, Deserialize)]
pub struct CreateRequest {
    pub account_id: AccountId,
    pub kind: RequestKind,
    pub amount: Decimal,
    pub proof_ref: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResolveRequest {
    pub admin_id: AccountId,
}

/// Create a pending deposit or withdrawal request.
///
/// # Errors
///
/// - `400 Bad Request`: Invalid amount
/// - `404 Not Found`: Account doesn't exist
/// - `422 Unprocessable Entity`: Account is inactive
pub async fn create_request(
    State(state): State<AppState>,
    Json(request): Json<CreateRequest>,
) -> ApiResult<Transaction> {
    state
        .ledger
        .create_transaction_request(
            request.account_id,
            request.kind,
            request.amount,
            request.proof_ref,
        )
        .await
        .map(Json)
        .map_err(ledger_error("create_transaction_request"))
}

/// Pending requests, oldest first.
pub async fn pending_requests(State(state): State<AppState>) -> ApiResult<Vec<Transaction>> {
    state
        .ledger
        .audit()
        .pending_requests()
        .await
        .map(Json)
        .map_err(ledger_error("pending_requests"))
}

pub async fn get_transaction(
    State(state): State<AppState>,
    Path(transaction_id): Path<TransactionId>,
) -> ApiResult<Transaction> {
    state
        .ledger
        .audit()
        .get_transaction(transaction_id)
        .await
        .map(Json)
        .map_err(ledger_error("get_transaction"))
}

/// Approve a pending request and apply it to the balance.
///
/// A withdrawal the account can no longer cover is recorded as rejected and
/// answered with `422`; it never stays pending.
///
/// # Errors
///
/// - `403 Forbidden`: `admin_id` is not an active administrator
/// - `404 Not Found`: Request doesn't exist
/// - `409 Conflict`: Request was already resolved
/// - `422 Unprocessable Entity`: Insufficient funds for a withdrawal
pub async fn approve(
    State(state): State<AppState>,
    request_id: RequestId,
    Path(transaction_id): Path<TransactionId>,
    Json(request): Json<ResolveRequest>,
) -> ApiResult<Transaction> {
    let approved = state
        .ledger
        .approve_transaction(transaction_id, request.admin_id)
        .await
        .map_err(ledger_error("approve_transaction"))?;

    metrics::ledger_movements_total(approved.kind.as_str());
    tracing::info!(
        request_id = request_id.as_str(),
        transaction_id = approved.id,
        admin_id = request.admin_id,
        "Request approved"
    );
    Ok(Json(approved))
}

/// Reject a pending request. No balance effect.
pub async fn reject(
    State(state): State<AppState>,
    request_id: RequestId,
    Path(transaction_id): Path<TransactionId>,
    Json(request): Json<ResolveRequest>,
) -> ApiResult<Transaction> {
    let rejected = state
        .ledger
        .reject_transaction(transaction_id, request.admin_id)
        .await
        .map_err(ledger_error("reject_transaction"))?;

    tracing::info!(
        request_id = request_id.as_str(),
        transaction_id = rejected.id,
        admin_id = request.admin_id,
        "Request rejected"
    );
    Ok(Json(rejected))
}
