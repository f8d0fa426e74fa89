//! HTTP handlers for item records

use axum::{
    extract::{Path, State},
    Json,
};

use shared::{Item, Reconciliation};

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::item::{ItemService, RegisterItemInput};
use crate::AppState;

/// Current on-hand quantity for an item
pub async fn get_item(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(item_id): Path<String>,
) -> AppResult<Json<Item>> {
    let service = ItemService::new(state.store);
    let item = service.get_item(&item_id).await?;
    Ok(Json(item))
}

/// Register or rename an item
pub async fn register_item(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(item_id): Path<String>,
    Json(input): Json<RegisterItemInput>,
) -> AppResult<Json<Item>> {
    let service = ItemService::new(state.store);
    let item = service.register_item(&item_id, input).await?;
    Ok(Json(item))
}

pub async fn reconcile_item(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(item_id): Path<String>,
) -> AppResult<Json<Reconciliation>> {
    let service = ItemService::new(state.store);
    let report = service.reconcile(&item_id).await?;
    Ok(Json(report))
}
