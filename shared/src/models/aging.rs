//! Batch aging projection

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{BatchStatus, ParseEnumError, StockBatch};

/// Display status of a batch in the aging report.
///
/// `Good` and `Empty` are the only values produced without thresholds.
/// `Fresh`, `Aging` and `Critical` appear only when thresholds are configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgingStatus {
    Good,
    Fresh,
    Aging,
    Critical,
    Empty,
}

impl AgingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgingStatus::Good => "good",
            AgingStatus::Fresh => "fresh",
            AgingStatus::Aging => "aging",
            AgingStatus::Critical => "critical",
            AgingStatus::Empty => "empty",
        }
    }
}

impl fmt::Display for AgingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgingStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "good" => Ok(AgingStatus::Good),
            "fresh" => Ok(AgingStatus::Fresh),
            "aging" => Ok(AgingStatus::Aging),
            "critical" => Ok(AgingStatus::Critical),
            "empty" => Ok(AgingStatus::Empty),
            other => Err(ParseEnumError::new("aging status", other)),
        }
    }
}

/// Day thresholds for graduated aging statuses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgingThresholds {
    pub aging_after_days: Option<i64>,
    pub critical_after_days: Option<i64>,
}

impl AgingThresholds {
    pub fn is_graduated(&self) -> bool {
        self.aging_after_days.is_some() || self.critical_after_days.is_some()
    }

    pub fn classify(&self, status: BatchStatus, days_in_stock: i64) -> AgingStatus {
        if status == BatchStatus::Empty {
            return AgingStatus::Empty;
        }
        if !self.is_graduated() {
            return AgingStatus::Good;
        }
        if matches!(self.critical_after_days, Some(limit) if days_in_stock >= limit) {
            AgingStatus::Critical
        } else if matches!(self.aging_after_days, Some(limit) if days_in_stock >= limit) {
            AgingStatus::Aging
        } else {
            AgingStatus::Fresh
        }
    }
}

/// Whole days between `created_at` and `now`, never negative
pub fn days_in_stock(created_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - created_at).num_days().max(0)
}

/// One row of the aging report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgingRow {
    pub batch_number: String,
    pub item_id: String,
    pub item_name: String,
    pub quantity_remaining: i64,
    pub created_at: DateTime<Utc>,
    pub days_in_stock: i64,
    pub status: AgingStatus,
}

impl AgingRow {
    pub fn project(
        batch: &StockBatch,
        item_name: &str,
        now: DateTime<Utc>,
        thresholds: &AgingThresholds,
    ) -> Self {
        let days = days_in_stock(batch.created_at, now);
        Self {
            batch_number: batch.batch_number.clone(),
            item_id: batch.item_id.clone(),
            item_name: item_name.to_string(),
            quantity_remaining: batch.quantity_remaining,
            created_at: batch.created_at,
            days_in_stock: days,
            status: thresholds.classify(batch.status, days),
        }
    }
}
