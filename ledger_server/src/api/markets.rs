//! Match and bet option handlers.
//!
//! The catalog side of the API: creating fixtures, pricing options,
//! opening and closing them, and settling every bet on an option at once.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sportsbook_ledger::{
    BetOption, BetOutcome, Match, MatchId, MatchStatus, OptionId, SettlementReport,
};

use super::AppState;
use super::accounts::DEFAULT_PAGE;
use super::error::{ApiResult, bad_request, ledger_error};
use super::request_id::RequestId;
use crate::metrics;

#[derive(Debug, Deserialize)]
pub struct CreateMatchRequest {
    pub home_team: String,
    pub away_team: String,
    pub starts_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateMatchRequest {
    pub status: MatchStatus,
    pub result: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AddOptionRequest {
    pub prediction: String,
    pub odds: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct UpdateOptionRequest {
    pub active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct OptionsQuery {
    #[serde(default)]
    pub active_only: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpcomingQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct SettleOptionRequest {
    pub outcome: BetOutcome,
}

/// Create a scheduled match.
///
/// # Request Body
///
/// ```json
/// {
///   "home_team": "Boca",
///   "away_team": "River",
///   "starts_at": "2026-05-01T20:00:00Z"
/// }
/// ```
pub async fn create_match(
    State(state): State<AppState>,
    Json(request): Json<CreateMatchRequest>,
) -> ApiResult<Match> {
    state
        .ledger
        .markets()
        .create_match(&request.home_team, &request.away_team, request.starts_at)
        .await
        .map(Json)
        .map_err(ledger_error("create_match"))
}

/// Matches still open for betting, soonest first.
///
/// `?limit=` defaults to one page.
pub async fn upcoming_matches(
    State(state): State<AppState>,
    Query(query): Query<UpcomingQuery>,
) -> ApiResult<Vec<Match>> {
    state
        .ledger
        .markets()
        .upcoming_matches(query.limit.unwrap_or(DEFAULT_PAGE))
        .await
        .map(Json)
        .map_err(ledger_error("upcoming_matches"))
}

pub async fn get_match(
    State(state): State<AppState>,
    Path(match_id): Path<MatchId>,
) -> ApiResult<Match> {
    state
        .ledger
        .markets()
        .get_match(match_id)
        .await
        .map(Json)
        .map_err(ledger_error("get_match"))
}

/// Move a match along `scheduled -> live -> finished`, or cancel it.
///
/// # Errors
///
/// - `404 Not Found`: Match doesn't exist
/// - `409 Conflict`: The match cannot move to that status
pub async fn update_match(
    State(state): State<AppState>,
    Path(match_id): Path<MatchId>,
    Json(request): Json<UpdateMatchRequest>,
) -> ApiResult<Match> {
    state
        .ledger
        .markets()
        .set_match_status(match_id, request.status, request.result.as_deref())
        .await
        .map(Json)
        .map_err(ledger_error("set_match_status"))
}

/// Price a new option on a match.
///
/// # Request Body
///
/// ```json
/// { "prediction": "Boca", "odds": "2.00" }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: Odds not above 1.00, or a blank prediction
/// - `404 Not Found`: Match doesn't exist
pub async fn add_option(
    State(state): State<AppState>,
    Path(match_id): Path<MatchId>,
    Json(request): Json<AddOptionRequest>,
) -> ApiResult<BetOption> {
    state
        .ledger
        .markets()
        .add_option(match_id, &request.prediction, request.odds)
        .await
        .map(Json)
        .map_err(ledger_error("add_option"))
}

/// Options on a match; `?active_only=true` hides closed ones.
pub async fn list_options(
    State(state): State<AppState>,
    Path(match_id): Path<MatchId>,
    Query(query): Query<OptionsQuery>,
) -> ApiResult<Vec<BetOption>> {
    state
        .ledger
        .markets()
        .options_for_match(match_id, query.active_only)
        .await
        .map(Json)
        .map_err(ledger_error("options_for_match"))
}

pub async fn get_option(
    State(state): State<AppState>,
    Path(option_id): Path<OptionId>,
) -> ApiResult<BetOption> {
    state
        .ledger
        .markets()
        .get_option(option_id)
        .await
        .map(Json)
        .map_err(ledger_error("get_option"))
}

/// Open or close an option for new bets.
pub async fn update_option(
    State(state): State<AppState>,
    Path(option_id): Path<OptionId>,
    Json(request): Json<UpdateOptionRequest>,
) -> ApiResult<BetOption> {
    let Some(active) = request.active else {
        return Err(bad_request("Nothing to update: expected `active`"));
    };

    state
        .ledger
        .markets()
        .set_option_active(option_id, active)
        .await
        .map(Json)
        .map_err(ledger_error("set_option_active"))
}

/// Close an option and settle all of its pending bets with one outcome.
///
/// # Response
///
/// ```json
/// { "option_id": 7, "won": 12, "lost": 0, "skipped": 1, "paid_out": "840.00" }
/// ```
pub async fn settle_option(
    State(state): State<AppState>,
    request_id: RequestId,
    Path(option_id): Path<OptionId>,
    Json(request): Json<SettleOptionRequest>,
) -> ApiResult<SettlementReport> {
    let report = state
        .ledger
        .bets()
        .settle_option(option_id, request.outcome)
        .await
        .map_err(ledger_error("settle_option"))?;

    metrics::ledger_movements_total("option_settled");
    tracing::info!(
        request_id = request_id.as_str(),
        option_id = option_id,
        won = report.won,
        lost = report.lost,
        skipped = report.skipped,
        "Option settled"
    );
    Ok(Json(report))
}
