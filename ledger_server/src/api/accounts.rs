//! Account API handlers.
//!
//! Opening accounts and the read side of the ledger: balances, bet lists,
//! audit history and transfer history.
//!
//! # Examples
//!
//! Open (or refresh) an account:
//! ```bash
//! curl -X POST http://localhost:6969/api/v1/accounts \
//!   -H "Content-Type: application/json" \
//!   -d '{"id": 42, "display_name": "Ana"}'
//! ```
//!
//! Read the last ten audit entries:
//! ```bash
//! curl http://localhost:6969/api/v1/accounts/42/transactions?limit=10
//! ```

use axum::{
    Json,
    extract::{Path, Query, State},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sportsbook_ledger::{
    Account, AccountId, Bet, BetStatus, Transaction, Transfer, TransferDirection,
};

use super::AppState;
use super::error::{ApiResult, ledger_error};

/// Page size when the caller gives no `limit`
pub const DEFAULT_PAGE: i64 = 50;

#[derive(Debug, Deserialize)]
pub struct OpenAccountRequest {
    pub id: AccountId,
    #[serde(default)]
    pub display_name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub account_id: AccountId,
    pub balance: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct BetsQuery {
    pub status: Option<BetStatus>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct TransfersQuery {
    #[serde(default)]
    pub direction: TransferDirection,
    pub limit: Option<i64>,
}

/// Open an account, or refresh the display name of an existing one.
///
/// Idempotent: a known id keeps its balance and flags.
///
/// # Request Body
///
/// ```json
/// { "id": 42, "display_name": "Ana" }
/// ```
///
/// # Response
///
/// Returns `200 OK` with the account:
/// ```json
/// {
///   "id": 42,
///   "display_name": "Ana",
///   "balance": "0.00",
///   "active": true,
///   "is_admin": false,
///   "version": 0,
///   "created_at": "2026-01-10T18:00:00Z",
///   "updated_at": "2026-01-10T18:00:00Z"
/// }
/// ```
pub async fn open_account(
    State(state): State<AppState>,
    Json(request): Json<OpenAccountRequest>,
) -> ApiResult<Account> {
    state
        .ledger
        .accounts()
        .open_account(request.id, &request.display_name)
        .await
        .map(Json)
        .map_err(ledger_error("open_account"))
}

/// Get an account.
///
/// # Errors
///
/// - `404 Not Found`: Account doesn't exist
pub async fn get_account(
    State(state): State<AppState>,
    Path(account_id): Path<AccountId>,
) -> ApiResult<Account> {
    state
        .ledger
        .accounts()
        .get_account(account_id)
        .await
        .map(Json)
        .map_err(ledger_error("get_account"))
}

/// Get the balance of an account.
///
/// # Response
///
/// ```json
/// { "account_id": 42, "balance": "70.00" }
/// ```
pub async fn get_balance(
    State(state): State<AppState>,
    Path(account_id): Path<AccountId>,
) -> ApiResult<BalanceResponse> {
    let balance = state
        .ledger
        .get_balance(account_id)
        .await
        .map_err(ledger_error("get_balance"))?;

    Ok(Json(BalanceResponse {
        account_id,
        balance,
    }))
}

/// List an account's bets, newest first, optionally filtered by `status`
/// (`pending`, `won`, `lost`, `cancelled`).
pub async fn list_bets(
    State(state): State<AppState>,
    Path(account_id): Path<AccountId>,
    Query(query): Query<BetsQuery>,
) -> ApiResult<Vec<Bet>> {
    state
        .ledger
        .list_bets_by_status(account_id, query.status)
        .await
        .map(Json)
        .map_err(ledger_error("list_bets"))
}

/// List an account's audit entries, newest first.
pub async fn list_transactions(
    State(state): State<AppState>,
    Path(account_id): Path<AccountId>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Vec<Transaction>> {
    state
        .ledger
        .list_transactions(account_id, query.limit.unwrap_or(DEFAULT_PAGE))
        .await
        .map(Json)
        .map_err(ledger_error("list_transactions"))
}

/// List the transfers an account sent, received, or both (`direction`).
pub async fn list_transfers(
    State(state): State<AppState>,
    Path(account_id): Path<AccountId>,
    Query(query): Query<TransfersQuery>,
) -> ApiResult<Vec<Transfer>> {
    state
        .ledger
        .transfers()
        .list_transfers(
            account_id,
            query.direction,
            query.limit.unwrap_or(DEFAULT_PAGE),
        )
        .await
        .map(Json)
        .map_err(ledger_error("list_transfers"))
}
