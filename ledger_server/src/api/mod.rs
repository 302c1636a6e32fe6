//! HTTP API for the account ledger.
//!
//! Thin JSON handlers over [`Ledger`]; every rule about money lives in the
//! library, the handlers only translate requests and errors.
//!
//! # Modules
//!
//! - [`accounts`]: Opening accounts, balances and history
//! - [`bets`]: Placing, settling and cancelling bets
//! - [`transfers`]: Peer-to-peer transfers
//! - [`transactions`]: Deposit/withdrawal requests and their approval
//! - [`markets`]: Matches, bet options and option-wide settlement
//! - [`error`]: Ledger error to HTTP status mapping
//! - [`request_id`]: Request correlation and request metrics
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use ledger_server::api::{create_router, AppState};
//! use sportsbook_ledger::{Ledger, LedgerConfig};
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!
//! let state = AppState {
//!     ledger: Ledger::in_memory(&LedgerConfig::default()),
//! };
//! let app = create_router(state);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # CORS
//!
//! CORS is configured permissively; the server is meant to sit behind the
//! chat bot or an admin console on a private network.

pub mod accounts;
pub mod bets;
pub mod error;
pub mod markets;
pub mod request_id;
pub mod transactions;
pub mod transfers;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
};
use serde_json::json;
use sportsbook_ledger::Ledger;
use tower_http::cors::CorsLayer;

/// Application state shared across all HTTP handlers.
///
/// Cloned for each request; [`Ledger`] is a bundle of `Arc`s.
#[derive(Clone)]
pub struct AppState {
    pub ledger: Ledger,
}

/// Create the complete API router with all endpoints and middleware.
///
/// # Endpoint Summary
///
/// ```text
/// GET   /health
/// POST  /api/v1/accounts
/// GET   /api/v1/accounts/{id}
/// GET   /api/v1/accounts/{id}/balance
/// GET   /api/v1/accounts/{id}/bets?status=
/// GET   /api/v1/accounts/{id}/transactions?limit=
/// GET   /api/v1/accounts/{id}/transfers?direction=&limit=
/// POST  /api/v1/bets
/// GET   /api/v1/bets/{id}
/// POST  /api/v1/bets/{id}/settle
/// POST  /api/v1/bets/{id}/cancel
/// POST  /api/v1/transfers
/// POST  /api/v1/transactions
/// GET   /api/v1/transactions/pending
/// GET   /api/v1/transactions/{id}
/// POST  /api/v1/transactions/{id}/approve
/// POST  /api/v1/transactions/{id}/reject
/// GET   /api/v1/matches?limit=
/// POST  /api/v1/matches
/// GET   /api/v1/matches/{id}
/// PATCH /api/v1/matches/{id}
/// GET   /api/v1/matches/{id}/options?active_only=
/// POST  /api/v1/matches/{id}/options
/// GET   /api/v1/options/{id}
/// PATCH /api/v1/options/{id}
/// POST  /api/v1/options/{id}/settle
/// ```
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", create_v1_router())
        .layer(axum::middleware::from_fn(request_id::request_id_middleware))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn create_v1_router() -> Router<AppState> {
    let account_routes = Router::new()
        .route("/accounts", post(accounts::open_account))
        .route("/accounts/{account_id}", get(accounts::get_account))
        .route("/accounts/{account_id}/balance", get(accounts::get_balance))
        .route("/accounts/{account_id}/bets", get(accounts::list_bets))
        .route(
            "/accounts/{account_id}/transactions",
            get(accounts::list_transactions),
        )
        .route(
            "/accounts/{account_id}/transfers",
            get(accounts::list_transfers),
        );

    let money_routes = Router::new()
        .route("/bets", post(bets::place_bet))
        .route("/bets/{bet_id}", get(bets::get_bet))
        .route("/bets/{bet_id}/settle", post(bets::settle_bet))
        .route("/bets/{bet_id}/cancel", post(bets::cancel_bet))
        .route("/transfers", post(transfers::transfer))
        .route("/transactions", post(transactions::create_request))
        .route("/transactions/pending", get(transactions::pending_requests))
        .route(
            "/transactions/{transaction_id}",
            get(transactions::get_transaction),
        )
        .route(
            "/transactions/{transaction_id}/approve",
            post(transactions::approve),
        )
        .route(
            "/transactions/{transaction_id}/reject",
            post(transactions::reject),
        );

    let market_routes = Router::new()
        .route(
            "/matches",
            get(markets::upcoming_matches).post(markets::create_match),
        )
        .route(
            "/matches/{match_id}",
            get(markets::get_match).patch(markets::update_match),
        )
        .route(
            "/matches/{match_id}/options",
            get(markets::list_options).post(markets::add_option),
        )
        .route(
            "/options/{option_id}",
            get(markets::get_option).patch(markets::update_option),
        )
        .route("/options/{option_id}/settle", post(markets::settle_option));

    Router::new()
        .merge(account_routes)
        .merge(money_routes)
        .merge(market_routes)
}

/// Health check endpoint for monitoring and load balancers.
///
/// Returns `200 OK` when the ledger's store answers, `503 Service Unavailable`
/// otherwise.
///
/// ```bash
/// curl http://localhost:6969/health
/// # {"status":"healthy","storage":true,"version":"0.1.0","timestamp":"2026-01-10T18:00:00Z"}
/// ```
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let storage_healthy = match state.ledger.ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("Health check failed: {}", e);
            false
        }
    };

    let status_code = if storage_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = json!({
        "status": if storage_healthy { "healthy" } else { "unhealthy" },
        "version": env!("CARGO_PKG_VERSION"),
        "storage": storage_healthy,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    (status_code, Json(response))
}
