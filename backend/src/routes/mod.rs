//! Route definitions for the stock ledger API

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes. Everything under `/api/v1` requires a bearer token.
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .nest("/stock", stock_routes())
        .nest("/batches", batch_routes())
        .nest("/items", item_routes())
        .route("/aging", get(handlers::aging_report))
        .route("/movements", get(handlers::list_movements))
        .route("/damages", get(handlers::list_damages))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

fn stock_routes() -> Router<AppState> {
    Router::new()
        .route("/in", post(handlers::stock_in))
        .route("/out", post(handlers::stock_out))
}

fn batch_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_batches))
        .route("/:batch_id", delete(handlers::delete_batch))
}

fn item_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/:item_id",
            get(handlers::get_item).put(handlers::register_item),
        )
        .route("/:item_id/reconciliation", get(handlers::reconcile_item))
}
