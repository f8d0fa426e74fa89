//! Read side of the movement log and the damage ledger

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Deserialize;

use shared::{validate_date_range, DamagedItem, DateRange, Direction, Pagination, StockMovement};

use crate::error::{AppError, AppResult};
use crate::store::{DamageFilter, LedgerStore, MovementFilter};

#[derive(Clone)]
pub struct LedgerService {
    store: Arc<dyn LedgerStore>,
}

/// Movement log query parameters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MovementQuery {
    pub item_id: Option<String>,
    pub direction: Option<Direction>,
    pub reason: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    /// Show rows carrying the damage reason as well
    pub include_damage: Option<bool>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// Damage ledger query parameters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DamageQuery {
    pub item_id: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

fn date_range(from: Option<NaiveDate>, to: Option<NaiveDate>) -> AppResult<DateRange> {
    validate_date_range(from, to).map_err(|m| AppError::validation("date_to", m))?;
    Ok(DateRange::new(from, to))
}

impl LedgerService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Movements newest first. Damage rows are hidden unless asked for.
    pub async fn list_movements(&self, query: MovementQuery) -> AppResult<Vec<StockMovement>> {
        let filter = MovementFilter {
            created: date_range(query.date_from, query.date_to)?,
            item_id: query.item_id,
            direction: query.direction,
            reason: query.reason,
            exclude_damage: !query.include_damage.unwrap_or(false),
            page: Pagination::new(query.page, query.per_page),
        };
        self.store.list_movements(&filter).await
    }

    pub async fn list_damages(&self, query: DamageQuery) -> AppResult<Vec<DamagedItem>> {
        let filter = DamageFilter {
            created: date_range(query.date_from, query.date_to)?,
            item_id: query.item_id,
            page: Pagination::new(query.page, query.per_page),
        };
        self.store.list_damages(&filter).await
    }
}
