//! Stock batch models

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ParseEnumError;

/// Number of distinct two-digit batch number suffixes per item
pub const BATCH_SUFFIX_SPACE: u32 = 100;

/// Lifecycle status of a batch. `Empty` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Active,
    Empty,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Active => "active",
            BatchStatus::Empty => "empty",
        }
    }

    /// Status a batch must carry for the given remaining quantity
    pub fn for_remaining(quantity_remaining: i64) -> Self {
        if quantity_remaining == 0 {
            BatchStatus::Empty
        } else {
            BatchStatus::Active
        }
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BatchStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(BatchStatus::Active),
            "empty" => Ok(BatchStatus::Empty),
            other => Err(ParseEnumError::new("batch status", other)),
        }
    }
}

/// An arrival batch of a single item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockBatch {
    pub id: Uuid,
    /// Insertion sequence, breaks ties between batches created at the same instant
    pub seq: i64,
    pub item_id: String,
    pub batch_number: String,
    pub quantity_received: i64,
    pub quantity_remaining: i64,
    pub status: BatchStatus,
    pub reason: String,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

impl StockBatch {
    /// Whether this batch can still be drawn from
    pub fn is_available(&self) -> bool {
        self.status == BatchStatus::Active && self.quantity_remaining > 0
    }

    /// Only fully consumed batches may be removed
    pub fn is_deletable(&self) -> bool {
        self.quantity_remaining == 0
    }

    /// FIFO ordering: oldest `created_at` first, insertion order on ties
    pub fn fifo_cmp(&self, other: &Self) -> Ordering {
        self.created_at
            .cmp(&other.created_at)
            .then(self.seq.cmp(&other.seq))
    }
}

/// Quantity drawn from (or put into) one batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchDraw {
    pub batch_number: String,
    pub quantity: i64,
}

/// Build a batch number from an item id and a two-digit suffix.
///
/// The suffix is always rendered with two digits, so the item id can be
/// recovered by stripping the last three characters.
pub fn format_batch_number(item_id: &str, suffix: u32) -> String {
    format!("{}-{:02}", item_id, suffix % BATCH_SUFFIX_SPACE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn batch(seq: i64, created_at: DateTime<Utc>) -> StockBatch {
        StockBatch {
            id: Uuid::new_v4(),
            seq,
            item_id: "SKU-1".to_string(),
            batch_number: format_batch_number("SKU-1", seq as u32),
            quantity_received: 5,
            quantity_remaining: 5,
            status: BatchStatus::Active,
            reason: "purchase".to_string(),
            created_by: Uuid::nil(),
            created_at,
        }
    }

    #[test]
    fn test_format_batch_number_pads_suffix() {
        assert_eq!(format_batch_number("SKU-1", 7), "SKU-1-07");
        assert_eq!(format_batch_number("SKU-1", 42), "SKU-1-42");
        assert_eq!(format_batch_number("SKU-1", 142), "SKU-1-42");
    }

    #[test]
    fn test_status_for_remaining() {
        assert_eq!(BatchStatus::for_remaining(0), BatchStatus::Empty);
        assert_eq!(BatchStatus::for_remaining(3), BatchStatus::Active);
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("active".parse::<BatchStatus>().unwrap(), BatchStatus::Active);
        assert_eq!("empty".parse::<BatchStatus>().unwrap(), BatchStatus::Empty);
        assert!("depleted".parse::<BatchStatus>().is_err());
    }

    #[test]
    fn test_fifo_cmp_orders_by_time_then_sequence() {
        let now = Utc::now();
        let older = batch(5, now - Duration::minutes(1));
        let same_time_first = batch(6, now);
        let same_time_second = batch(7, now);

        assert_eq!(older.fifo_cmp(&same_time_first), Ordering::Less);
        assert_eq!(same_time_first.fifo_cmp(&same_time_second), Ordering::Less);
        assert_eq!(same_time_second.fifo_cmp(&older), Ordering::Greater);
    }

    #[test]
    fn test_availability_and_deletability() {
        let mut b = batch(1, Utc::now());
        assert!(b.is_available());
        assert!(!b.is_deletable());

        b.quantity_remaining = 0;
        b.status = BatchStatus::Empty;
        assert!(!b.is_available());
        assert!(b.is_deletable());
    }
}
