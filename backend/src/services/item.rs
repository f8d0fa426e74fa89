//! Item registration, balance lookup and reconciliation

use std::sync::Arc;

use serde::Deserialize;

use shared::{validate_item_id, Item, Reconciliation};

use crate::error::{AppError, AppResult};
use crate::store::LedgerStore;

const MAX_NAME_LEN: usize = 200;

#[derive(Clone)]
pub struct ItemService {
    store: Arc<dyn LedgerStore>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterItemInput {
    pub name: String,
}

impl ItemService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    pub async fn get_item(&self, item_id: &str) -> AppResult<Item> {
        self.store
            .find_item(item_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Item {}", item_id)))
    }

    /// Register an item at quantity 0 or rename it; never touches quantity
    pub async fn register_item(&self, item_id: &str, input: RegisterItemInput) -> AppResult<Item> {
        validate_item_id(item_id).map_err(|m| AppError::validation("item_id", m))?;

        let name = input.name.trim();
        if name.is_empty() {
            return Err(AppError::validation("name", "Item name is required"));
        }
        if name.chars().count() > MAX_NAME_LEN {
            return Err(AppError::validation(
                "name",
                "Item name must be at most 200 characters",
            ));
        }

        let item = self.store.upsert_item(item_id, name).await?;
        tracing::info!(item_id = %item.item_id, name = %item.name, "Item registered");
        Ok(item)
    }

    /// Compare the cached quantity against the batch remainders.
    ///
    /// Read under the item lock so a concurrent write is never half-observed.
    /// The transaction is dropped, not committed.
    pub async fn reconcile(&self, item_id: &str) -> AppResult<Reconciliation> {
        let mut tx = self.store.begin().await?;

        let item = tx
            .item_for_update(item_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Item {}", item_id)))?;
        let batches = tx.active_batches_for_update(item_id).await?;

        let report = Reconciliation::new(&item, &batches);
        if !report.consistent {
            tracing::error!(
                item_id,
                quantity = report.quantity,
                batch_total = report.batch_total,
                "Item quantity diverges from batch remainders"
            );
        }
        Ok(report)
    }
}
