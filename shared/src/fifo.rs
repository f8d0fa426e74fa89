//! FIFO consumption planning
//!
//! Given the batches of one item, decide how much to draw from each so that
//! the oldest stock leaves first. Planning is pure: the caller applies the
//! plan to storage inside its own transaction.

use thiserror::Error;
use uuid::Uuid;

use crate::models::{BatchDraw, BatchStatus, StockBatch};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FifoError {
    #[error("requested quantity must be positive, got {0}")]
    NonPositive(i64),

    #[error("batches hold {available} but {requested} was requested")]
    Shortfall { requested: i64, available: i64 },
}

/// Planned draw from a single batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedDraw {
    pub batch_id: Uuid,
    pub batch_number: String,
    pub quantity: i64,
    pub remaining_after: i64,
    pub status_after: BatchStatus,
}

/// Ordered set of draws covering one stock-out
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConsumptionPlan {
    pub draws: Vec<PlannedDraw>,
}

impl ConsumptionPlan {
    pub fn total(&self) -> i64 {
        self.draws.iter().map(|d| d.quantity).sum()
    }

    /// Batch recorded on single-value ledger views
    pub fn first_batch_number(&self) -> Option<&str> {
        self.draws.first().map(|d| d.batch_number.as_str())
    }

    pub fn allocations(&self) -> Vec<BatchDraw> {
        self.draws
            .iter()
            .map(|d| BatchDraw {
                batch_number: d.batch_number.clone(),
                quantity: d.quantity,
            })
            .collect()
    }
}

/// Plan a FIFO draw of `quantity` across `batches`.
///
/// Batches that are empty or have nothing remaining are skipped. The rest are
/// walked oldest first (`created_at`, then insertion sequence) and each gives
/// up `min(outstanding, remaining)` until the request is covered. A request the
/// batches cannot cover is an error, never a partial plan.
pub fn plan_consumption(batches: &[StockBatch], quantity: i64) -> Result<ConsumptionPlan, FifoError> {
    if quantity <= 0 {
        return Err(FifoError::NonPositive(quantity));
    }

    let mut ordered: Vec<&StockBatch> = batches.iter().filter(|b| b.is_available()).collect();
    ordered.sort_by(|a, b| a.fifo_cmp(b));

    let mut outstanding = quantity;
    let mut plan = ConsumptionPlan::default();

    for batch in ordered {
        if outstanding == 0 {
            break;
        }
        let take = outstanding.min(batch.quantity_remaining);
        let remaining_after = batch.quantity_remaining - take;
        plan.draws.push(PlannedDraw {
            batch_id: batch.id,
            batch_number: batch.batch_number.clone(),
            quantity: take,
            remaining_after,
            status_after: BatchStatus::for_remaining(remaining_after),
        });
        outstanding -= take;
    }

    if outstanding > 0 {
        return Err(FifoError::Shortfall {
            requested: quantity,
            available: quantity - outstanding,
        });
    }

    Ok(plan)
}
