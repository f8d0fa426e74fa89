//! HTTP handlers for the movement log and damage ledger

use axum::{
    extract::{Query, State},
    Json,
};

use shared::{DamagedItem, StockMovement};

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::ledger::{DamageQuery, LedgerService, MovementQuery};
use crate::AppState;

pub async fn list_movements(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(query): Query<MovementQuery>,
) -> AppResult<Json<Vec<StockMovement>>> {
    let service = LedgerService::new(state.store);
    let movements = service.list_movements(query).await?;
    Ok(Json(movements))
}

pub async fn list_damages(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(query): Query<DamageQuery>,
) -> AppResult<Json<Vec<DamagedItem>>> {
    let service = LedgerService::new(state.store);
    let damages = service.list_damages(query).await?;
    Ok(Json(damages))
}
