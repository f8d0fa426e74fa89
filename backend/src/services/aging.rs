//! Batch aging report

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;

use shared::{validate_date_range, AgingRow, AgingStatus, AgingThresholds, DateRange};

use crate::error::{AppError, AppResult};
use crate::store::{BatchFilter, LedgerStore};

#[derive(Clone)]
pub struct AgingService {
    store: Arc<dyn LedgerStore>,
    thresholds: AgingThresholds,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AgingQuery {
    pub item_id: Option<String>,
    /// Matched against the derived display status
    pub status: Option<AgingStatus>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

impl AgingService {
    pub fn new(store: Arc<dyn LedgerStore>, thresholds: AgingThresholds) -> Self {
        Self { store, thresholds }
    }

    /// Project every matching batch into an aging row as of `now`, oldest first
    pub async fn report(&self, query: AgingQuery, now: DateTime<Utc>) -> AppResult<Vec<AgingRow>> {
        validate_date_range(query.date_from, query.date_to)
            .map_err(|m| AppError::validation("date_to", m))?;

        let filter = BatchFilter {
            item_id: query.item_id,
            status: None,
            created: DateRange::new(query.date_from, query.date_to),
        };

        let rows = self
            .store
            .list_batches(&filter)
            .await?
            .into_iter()
            .map(|row| AgingRow::project(&row.batch, &row.item_name, now, &self.thresholds))
            .filter(|row| query.status.map_or(true, |status| row.status == status))
            .collect();

        Ok(rows)
    }
}
