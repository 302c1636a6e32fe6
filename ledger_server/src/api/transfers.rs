//! Transfer API handler.

use axum::{Json, extract::State};
use rust_decimal::Decimal;
use serde::Deserialize;
use sportsbook_ledger::{AccountId, Transfer};

use super::AppState;
use super::error::{ApiResult, ledger_error};
use super::request_id::RequestId;
use crate::metrics;

#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    pub sender_id: AccountId,
    pub receiver_id: AccountId,
    pub amount: Decimal,
}

/// Move funds between two accounts.
///
/// # Request Body
///
/// ```json
/// { "sender_id": 1, "receiver_id": 2, "amount": "20.00" }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: Invalid amount or sender equals receiver
/// - `404 Not Found`: Either account doesn't exist
/// - `422 Unprocessable Entity`: Sender lacks the funds or is inactive
pub async fn transfer(
    State(state): State<AppState>,
    request_id: RequestId,
    Json(request): Json<TransferRequest>,
) -> ApiResult<Transfer> {
    let transfer = state
        .ledger
        .transfer(request.sender_id, request.receiver_id, request.amount)
        .await
        .map_err(ledger_error("transfer"))?;

    metrics::ledger_movements_total("transfer");
    tracing::info!(
        request_id = request_id.as_str(),
        transfer_id = transfer.id,
        "Transfer committed"
    );
    Ok(Json(transfer))
}
