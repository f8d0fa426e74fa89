//! HTTP handlers for batch endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use shared::StockBatch;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::batch::{BatchQuery, BatchService};
use crate::AppState;

pub async fn list_batches(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(query): Query<BatchQuery>,
) -> AppResult<Json<Vec<StockBatch>>> {
    let service = BatchService::new(state.store);
    let batches = service.list_batches(query).await?;
    Ok(Json(batches))
}

/// Delete a fully consumed batch
pub async fn delete_batch(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(batch_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let service = BatchService::new(state.store);
    service.delete_batch(batch_id).await?;
    tracing::debug!(user_id = %current_user.0.user_id, batch_id = %batch_id, "Batch delete served");
    Ok(StatusCode::NO_CONTENT)
}
