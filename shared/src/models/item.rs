//! Item quantity record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::StockBatch;

/// On-hand quantity for one SKU.
///
/// `quantity` is a cache of the remaining quantity across the item's batches
/// and is only ever written together with those batches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub item_id: String,
    pub name: String,
    pub quantity: i64,
    pub updated_at: DateTime<Utc>,
}

/// Comparison of an item's cached quantity against its batches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reconciliation {
    pub item_id: String,
    pub quantity: i64,
    pub batch_total: i64,
    pub active_batches: usize,
    pub consistent: bool,
}

impl Reconciliation {
    pub fn new(item: &Item, batches: &[StockBatch]) -> Self {
        let batch_total: i64 = batches
            .iter()
            .filter(|b| b.item_id == item.item_id)
            .map(|b| b.quantity_remaining)
            .sum();
        let active_batches = batches
            .iter()
            .filter(|b| b.item_id == item.item_id && b.is_available())
            .count();

        Self {
            item_id: item.item_id.clone(),
            quantity: item.quantity,
            batch_total,
            active_batches,
            consistent: batch_total == item.quantity,
        }
    }
}
