//! HTTP handlers for stock-in and stock-out

use axum::{extract::State, Json};

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::allocation::{
    AllocationEngine, StockInInput, StockInReceipt, StockOutInput, StockOutReceipt,
};
use crate::AppState;

/// Record arriving stock as a new batch
pub async fn stock_in(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<StockInInput>,
) -> AppResult<Json<StockInReceipt>> {
    let engine = AllocationEngine::new(state.store, state.config.ledger);
    let receipt = engine.stock_in(current_user.0.user_id, input).await?;
    Ok(Json(receipt))
}

/// Remove stock, oldest batches first
pub async fn stock_out(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<StockOutInput>,
) -> AppResult<Json<StockOutReceipt>> {
    let engine = AllocationEngine::new(state.store, state.config.ledger);
    let receipt = engine.stock_out(current_user.0.user_id, input).await?;
    Ok(Json(receipt))
}
