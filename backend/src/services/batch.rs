//! Batch listing and deletion

use std::sync::Arc;

use serde::Deserialize;
use uuid::Uuid;

use shared::{BatchStatus, StockBatch};

use crate::error::{AppError, AppResult};
use crate::store::{BatchFilter, LedgerStore};

#[derive(Clone)]
pub struct BatchService {
    store: Arc<dyn LedgerStore>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BatchQuery {
    pub item_id: Option<String>,
    pub status: Option<BatchStatus>,
}

impl BatchService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Batches oldest first, optionally narrowed to one item or status
    pub async fn list_batches(&self, query: BatchQuery) -> AppResult<Vec<StockBatch>> {
        let filter = BatchFilter {
            item_id: query.item_id,
            status: query.status,
            ..Default::default()
        };
        let rows = self.store.list_batches(&filter).await?;
        Ok(rows.into_iter().map(|row| row.batch).collect())
    }

    /// Delete a batch that has been fully consumed.
    ///
    /// The batch row stays locked between the emptiness check and the delete.
    pub async fn delete_batch(&self, batch_id: Uuid) -> AppResult<()> {
        let mut tx = self.store.begin().await?;

        let batch = tx
            .batch_for_update(batch_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Batch {}", batch_id)))?;

        if !batch.is_deletable() {
            return Err(AppError::Conflict {
                resource: "batch".to_string(),
                message: format!(
                    "Batch {} still holds {} units and cannot be deleted",
                    batch.batch_number, batch.quantity_remaining
                ),
            });
        }

        tx.delete_batch(batch_id).await?;
        tx.commit().await?;

        tracing::info!(
            batch_id = %batch_id,
            batch_number = %batch.batch_number,
            item_id = %batch.item_id,
            "Empty batch deleted"
        );
        Ok(())
    }
}
