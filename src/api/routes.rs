//! Balance and report routes.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use tracing::debug;

use super::AppState;
use super::body::AmountBatch;
use super::error::{ApiError, ApiResult};
use crate::ledger::is_valid_code;
use crate::presenter;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/amount/get", get(full_report))
        .route("/amount/set", post(set_amount))
        .route("/modify", post(modify_amount))
        .route("/{code}/get", get(currency_balance))
}

/// GET `/{code}/get` - Balance of a single currency.
async fn currency_balance(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> ApiResult<String> {
    if !is_valid_code(&code) {
        return Err(ApiError::NotFound);
    }
    let amount = state.ledger.balance_of(&code)?;
    Ok(presenter::format_balance(&code.to_uppercase(), amount))
}

/// GET `/amount/get` - Balances, rates and total.
async fn full_report(State(state): State<AppState>) -> String {
    presenter::full_report(&state.ledger.snapshot())
}

/// POST `/amount/set` - Overwrite balances, e.g. `{"usd": 10}`.
async fn set_amount(
    State(state): State<AppState>,
    Json(AmountBatch(body)): Json<AmountBatch>,
) -> ApiResult<&'static str> {
    debug!(?body, "Setting balances");
    state
        .ledger
        .set_balances(&body)
        .map_err(ApiError::SetFailed)?;
    Ok("Amount set successfully!")
}

/// POST `/modify` - Add deltas to balances, e.g. `{"rub": 10, "eur": -5}`.
async fn modify_amount(
    State(state): State<AppState>,
    Json(AmountBatch(body)): Json<AmountBatch>,
) -> ApiResult<&'static str> {
    debug!(?body, "Modifying balances");
    state
        .ledger
        .modify_balances(&body)
        .map_err(ApiError::ModifyFailed)?;
    Ok("Amount modified successfully!")
}
