//! HTTP handler for the aging report

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::Utc;

use shared::AgingRow;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::aging::{AgingQuery, AgingService};
use crate::AppState;

/// Aging rows for batches, oldest first
pub async fn aging_report(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(query): Query<AgingQuery>,
) -> AppResult<Json<Vec<AgingRow>>> {
    let service = AgingService::new(state.store, state.config.aging.thresholds());
    let rows = service.report(query, Utc::now()).await?;
    Ok(Json(rows))
}
