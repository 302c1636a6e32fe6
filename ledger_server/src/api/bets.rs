//! Bet API handlers.
//!
//! Placing, settling and cancelling single bets. Each call is one unit of
//! work inside the ledger: the stake, payout or refund and its audit entry
//! commit together or not at all.
//!
//! # Examples
//!
//! Place a bet:
//! ```bash
//! curl -X POST http://localhost:6969/api/v1/bets \
//!   -H "Content-Type: application/json" \
//!   -d '{"account_id": 42, "option_id": 7, "amount": "30.00"}'
//! ```
//!
//! Settle it:
//! ```bash
//! curl -X POST http://localhost:6969/api/v1/bets/1/settle \
//!   -H "Content-Type: application/json" \
//!   -d '{"outcome": "won"}'
//! ```

use axum::{
    Json,
    extract::{Path, State},
};
use rust_decimal::Decimal;
use serde::Deserialize;
use sportsbook_ledger::{AccountId, Bet, BetId, BetOutcome, OptionId};

use super::AppState;
use super::error::{ApiResult, ledger_error};
use super::request_id::RequestId;
use crate::metrics;

#[derive(Debug, Deserialize)]
pub struct PlaceBetRequest {
    pub account_id: AccountId,
    pub option_id: OptionId,
    pub amount: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct SettleBetRequest {
    pub outcome: BetOutcome,
}

/// Place a bet on an open option.
///
/// The stake is debited immediately and the potential win is frozen at the
/// option's current odds.
///
/// # Request Body
///
/// ```json
/// { "account_id": 42, "option_id": 7, "amount": "30.00" }
/// ```
///
/// # Response
///
/// Returns `200 OK` with the pending bet:
/// ```json
/// {
///   "id": 1,
///   "account_id": 42,
///   "option_id": 7,
///   "amount": "30.00",
///   "odds": "2.00",
///   "potential_win": "60.00",
///   "status": "pending",
///   "created_at": "2026-01-10T18:00:00Z",
///   "settled_at": null
/// }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: Amount is not a positive value with at most two decimals
/// - `404 Not Found`: Account or option doesn't exist
/// - `422 Unprocessable Entity`: Insufficient funds, option closed, or account inactive
/// - `503 Service Unavailable`: The account stayed locked; retry
pub async fn place_bet(
    State(state): State<AppState>,
    request_id: RequestId,
    Json(request): Json<PlaceBetRequest>,
) -> ApiResult<Bet> {
    let bet = state
        .ledger
        .place_bet(request.account_id, request.option_id, request.amount)
        .await
        .map_err(ledger_error("place_bet"))?;

    metrics::ledger_movements_total("bet_placed");
    tracing::info!(
        request_id = request_id.as_str(),
        bet_id = bet.id,
        account_id = bet.account_id,
        "Bet placed"
    );
    Ok(Json(bet))
}

/// Get a bet.
pub async fn get_bet(State(state): State<AppState>, Path(bet_id): Path<BetId>) -> ApiResult<Bet> {
    state
        .ledger
        .bets()
        .get_bet(bet_id)
        .await
        .map(Json)
        .map_err(ledger_error("get_bet"))
}

/// Settle a pending bet as `won` or `lost`.
///
/// A win credits the frozen potential win; a loss moves no money.
///
/// # Errors
///
/// - `404 Not Found`: Bet doesn't exist
/// - `409 Conflict`: Bet is already settled or cancelled
pub async fn settle_bet(
    State(state): State<AppState>,
    request_id: RequestId,
    Path(bet_id): Path<BetId>,
    Json(request): Json<SettleBetRequest>,
) -> ApiResult<Bet> {
    let bet = state
        .ledger
        .settle_bet(bet_id, request.outcome)
        .await
        .map_err(ledger_error("settle_bet"))?;

    metrics::ledger_movements_total("bet_settled");
    tracing::info!(
        request_id = request_id.as_str(),
        bet_id = bet.id,
        status = %bet.status,
        "Bet settled"
    );
    Ok(Json(bet))
}

/// Cancel a pending bet and refund its stake.
///
/// # Errors
///
/// - `404 Not Found`: Bet doesn't exist
/// - `409 Conflict`: Bet is already settled or cancelled
pub async fn cancel_bet(
    State(state): State<AppState>,
    request_id: RequestId,
    Path(bet_id): Path<BetId>,
) -> ApiResult<Bet> {
    let bet = state
        .ledger
        .cancel_bet(bet_id)
        .await
        .map_err(ledger_error("cancel_bet"))?;

    metrics::ledger_movements_total("bet_refunded");
    tracing::info!(request_id = request_id.as_str(), bet_id = bet.id, "Bet cancelled");
    Ok(Json(bet))
}
