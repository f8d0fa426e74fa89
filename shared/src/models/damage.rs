//! Damage sub-ledger

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::BatchDraw;

/// Append-only record of stock written off as damaged
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamagedItem {
    pub id: Uuid,
    pub item_id: String,
    pub quantity: i64,
    pub damage_reason: String,
    pub batch_number: String,
    pub allocations: Vec<BatchDraw>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}
