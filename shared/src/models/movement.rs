//! Stock movement models and reason vocabularies

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{BatchDraw, ParseEnumError};
use crate::validation::MAX_REASON_LEN;

/// Reason value reserved for damage stock-outs. Movement views exclude it.
pub const DAMAGE_REASON: &str = "damage";

/// Movement direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::In => "in",
            Direction::Out => "out",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in" => Ok(Direction::In),
            "out" => Ok(Direction::Out),
            other => Err(ParseEnumError::new("direction", other)),
        }
    }
}

/// Why stock arrived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockInReason {
    Purchase,
    Return,
    Transfer,
    Other,
}

impl StockInReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockInReason::Purchase => "purchase",
            StockInReason::Return => "return",
            StockInReason::Transfer => "transfer",
            StockInReason::Other => "other",
        }
    }

    /// Text recorded on the batch and movement.
    ///
    /// `Other` records the caller's free text, which must not be blank.
    pub fn resolve(&self, other_reason: Option<&str>) -> Result<String, &'static str> {
        resolve_reason(self.as_str(), *self == StockInReason::Other, other_reason)
    }
}

/// Why stock left
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockOutReason {
    Sale,
    Transfer,
    Return,
    Loss,
    Damage,
    Other,
}

impl StockOutReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockOutReason::Sale => "sale",
            StockOutReason::Transfer => "transfer",
            StockOutReason::Return => "return",
            StockOutReason::Loss => "loss",
            StockOutReason::Damage => DAMAGE_REASON,
            StockOutReason::Other => "other",
        }
    }

    /// Damage goes to the damage ledger instead of the movement log
    pub fn is_damage(&self) -> bool {
        *self == StockOutReason::Damage
    }

    pub fn resolve(&self, other_reason: Option<&str>) -> Result<String, &'static str> {
        resolve_reason(self.as_str(), *self == StockOutReason::Other, other_reason)
    }
}

fn resolve_reason(
    canonical: &str,
    is_other: bool,
    other_reason: Option<&str>,
) -> Result<String, &'static str> {
    if !is_other {
        return Ok(canonical.to_string());
    }
    match other_reason.map(str::trim) {
        Some(text) if text.eq_ignore_ascii_case(DAMAGE_REASON) => {
            Err("'damage' is reserved; use the damage reason instead")
        }
        Some(text) if text.chars().count() > MAX_REASON_LEN => {
            Err("Reason text must be at most 200 characters")
        }
        Some(text) if !text.is_empty() => Ok(text.to_string()),
        _ => Err("A description is required when the reason is 'other'"),
    }
}

/// Append-only audit record of a normal logistics movement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: Uuid,
    pub item_id: String,
    pub direction: Direction,
    pub quantity: i64,
    pub reason: String,
    pub balance_after: i64,
    /// First batch touched: the new batch for `in`, the oldest drawn for `out`
    pub batch_number: String,
    /// Every batch touched, in consumption order
    pub allocations: Vec<BatchDraw>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}
