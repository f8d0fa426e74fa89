//! Allocation engine for stock-in and stock-out
//!
//! The engine is the only writer of item quantities, batch remainders and
//! ledger records. Each call runs as one transaction: the item row is locked,
//! the FIFO plan is computed from batches read inside that transaction, and
//! batches, item quantity and exactly one ledger record commit together.

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared::{
    format_batch_number, plan_consumption, validate_damage_reason, validate_item_id,
    validate_quantity, BatchDraw, Direction, StockBatch, StockInReason, StockOutReason,
    BATCH_SUFFIX_SPACE,
};

use crate::config::LedgerConfig;
use crate::error::{AppError, AppResult};
use crate::store::{LedgerStore, LedgerTx, NewBatch, NewDamage, NewMovement};

/// Allocation engine for one request
#[derive(Clone)]
pub struct AllocationEngine {
    store: Arc<dyn LedgerStore>,
    config: LedgerConfig,
}

/// Input for recording arriving stock
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockInInput {
    pub item_id: String,
    pub quantity: i64,
    pub reason: StockInReason,
    #[serde(default)]
    pub other_reason: Option<String>,
}

/// Input for removing stock
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockOutInput {
    pub item_id: String,
    pub quantity: i64,
    pub reason: StockOutReason,
    #[serde(default)]
    pub other_reason: Option<String>,
    #[serde(default)]
    pub damage_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockInReceipt {
    pub new_balance: i64,
    pub batch_number: String,
    pub batch_id: Uuid,
    pub movement_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockOutReceipt {
    pub new_balance: i64,
    /// Batches drawn from, oldest first
    pub consumed_batches: Vec<BatchDraw>,
    pub movement_id: Option<Uuid>,
    pub damage_id: Option<Uuid>,
}

#[derive(Debug)]
struct StockInCommand {
    item_id: String,
    quantity: i64,
    reason: String,
}

#[derive(Debug)]
struct StockOutCommand {
    item_id: String,
    quantity: i64,
    reason: String,
    /// Present only for damage stock-outs
    damage_reason: Option<String>,
}

impl StockInInput {
    fn validate(&self) -> AppResult<StockInCommand> {
        validate_item_id(&self.item_id).map_err(|m| AppError::validation("item_id", m))?;
        validate_quantity(self.quantity).map_err(|m| AppError::validation("quantity", m))?;
        let reason = self
            .reason
            .resolve(self.other_reason.as_deref())
            .map_err(|m| AppError::validation("other_reason", m))?;

        Ok(StockInCommand {
            item_id: self.item_id.clone(),
            quantity: self.quantity,
            reason,
        })
    }
}

impl StockOutInput {
    fn validate(&self) -> AppResult<StockOutCommand> {
        validate_item_id(&self.item_id).map_err(|m| AppError::validation("item_id", m))?;
        validate_quantity(self.quantity).map_err(|m| AppError::validation("quantity", m))?;
        let reason = self
            .reason
            .resolve(self.other_reason.as_deref())
            .map_err(|m| AppError::validation("other_reason", m))?;
        let damage_reason = if self.reason.is_damage() {
            Some(
                validate_damage_reason(self.damage_reason.as_deref())
                    .map_err(|m| AppError::validation("damage_reason", m))?,
            )
        } else {
            None
        };

        Ok(StockOutCommand {
            item_id: self.item_id.clone(),
            quantity: self.quantity,
            reason,
            damage_reason,
        })
    }
}

impl AllocationEngine {
    pub fn new(store: Arc<dyn LedgerStore>, config: LedgerConfig) -> Self {
        Self { store, config }
    }

    /// Record a new arrival batch and raise the item balance
    pub async fn stock_in(&self, actor: Uuid, input: StockInInput) -> AppResult<StockInReceipt> {
        let cmd = input.validate()?;
        let receipt = self
            .with_retry("stock_in", &cmd.item_id, || self.try_stock_in(&cmd, actor))
            .await?;

        tracing::info!(
            item_id = %cmd.item_id,
            quantity = cmd.quantity,
            batch_number = %receipt.batch_number,
            new_balance = receipt.new_balance,
            "Stock in recorded"
        );
        Ok(receipt)
    }

    /// Draw stock from the oldest batches first and lower the item balance
    pub async fn stock_out(&self, actor: Uuid, input: StockOutInput) -> AppResult<StockOutReceipt> {
        let cmd = input.validate()?;
        let receipt = self
            .with_retry("stock_out", &cmd.item_id, || self.try_stock_out(&cmd, actor))
            .await?;

        tracing::info!(
            item_id = %cmd.item_id,
            quantity = cmd.quantity,
            reason = %cmd.reason,
            batches = receipt.consumed_batches.len(),
            new_balance = receipt.new_balance,
            damaged = receipt.damage_id.is_some(),
            "Stock out recorded"
        );
        Ok(receipt)
    }

    /// Re-run a whole transaction after transient storage failures.
    ///
    /// Every attempt starts from a fresh transaction; nothing is resumed.
    async fn with_retry<T, F, Fut>(&self, operation: &str, item_id: &str, mut attempt: F) -> AppResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        let mut retries = 0;
        loop {
            match attempt().await {
                Err(err) if err.is_transient() && retries < self.config.storage_retry_attempts => {
                    retries += 1;
                    tracing::warn!(
                        operation,
                        item_id,
                        retry = retries,
                        error = %err,
                        "Transient storage failure, re-running transaction"
                    );
                }
                result => return result,
            }
        }
    }

    async fn try_stock_in(&self, cmd: &StockInCommand, actor: Uuid) -> AppResult<StockInReceipt> {
        let mut tx = self.store.begin().await?;

        let item = tx
            .item_for_update(&cmd.item_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Item {}", cmd.item_id)))?;

        let batch_number = self.draw_batch_number(tx.as_mut(), &item.item_id).await?;
        let now = Utc::now();

        let batch = tx
            .insert_batch(NewBatch {
                item_id: item.item_id.clone(),
                batch_number,
                quantity: cmd.quantity,
                reason: cmd.reason.clone(),
                created_by: actor,
                created_at: now,
            })
            .await?;

        let new_balance = item
            .quantity
            .checked_add(cmd.quantity)
            .ok_or_else(|| AppError::validation("quantity", "Quantity exceeds the maximum balance"))?;
        tx.set_item_quantity(&item.item_id, new_balance).await?;

        let batches = tx.active_batches_for_update(&item.item_id).await?;
        ensure_balanced(&item.item_id, new_balance, total_remaining(&batches))?;

        let movement = tx
            .append_movement(NewMovement {
                item_id: item.item_id.clone(),
                direction: Direction::In,
                quantity: cmd.quantity,
                reason: cmd.reason.clone(),
                balance_after: new_balance,
                batch_number: batch.batch_number.clone(),
                allocations: vec![BatchDraw {
                    batch_number: batch.batch_number.clone(),
                    quantity: cmd.quantity,
                }],
                created_by: actor,
                created_at: now,
            })
            .await?;

        tx.commit().await?;

        Ok(StockInReceipt {
            new_balance,
            batch_number: batch.batch_number,
            batch_id: batch.id,
            movement_id: movement.id,
        })
    }

    async fn try_stock_out(&self, cmd: &StockOutCommand, actor: Uuid) -> AppResult<StockOutReceipt> {
        let mut tx = self.store.begin().await?;

        let item = tx
            .item_for_update(&cmd.item_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Item {}", cmd.item_id)))?;

        if cmd.quantity > item.quantity {
            return Err(AppError::InsufficientStock {
                item_id: item.item_id,
                requested: cmd.quantity,
                available: item.quantity,
            });
        }

        let batches = tx.active_batches_for_update(&item.item_id).await?;
        let plan = plan_consumption(&batches, cmd.quantity).map_err(|err| {
            tracing::error!(
                item_id = %item.item_id,
                item_quantity = item.quantity,
                batch_total = total_remaining(&batches),
                error = %err,
                "Item balance is not backed by its batches"
            );
            AppError::Internal(format!("Ledger for item {} is inconsistent: {}", item.item_id, err))
        })?;

        for draw in &plan.draws {
            tx.update_batch(draw.batch_id, draw.remaining_after, draw.status_after)
                .await?;
        }

        let new_balance = item.quantity - cmd.quantity;
        ensure_balanced(
            &item.item_id,
            new_balance,
            total_remaining(&batches) - plan.total(),
        )?;
        tx.set_item_quantity(&item.item_id, new_balance).await?;

        let first_batch = plan
            .first_batch_number()
            .ok_or_else(|| AppError::Internal("stock-out drew from no batch".to_string()))?
            .to_string();
        let consumed_batches = plan.allocations();
        let now = Utc::now();

        let (movement_id, damage_id) = match &cmd.damage_reason {
            Some(damage_reason) => {
                let damage = tx
                    .append_damage(NewDamage {
                        item_id: item.item_id.clone(),
                        quantity: cmd.quantity,
                        damage_reason: damage_reason.clone(),
                        batch_number: first_batch,
                        allocations: consumed_batches.clone(),
                        created_by: actor,
                        created_at: now,
                    })
                    .await?;
                (None, Some(damage.id))
            }
            None => {
                let movement = tx
                    .append_movement(NewMovement {
                        item_id: item.item_id.clone(),
                        direction: Direction::Out,
                        quantity: cmd.quantity,
                        reason: cmd.reason.clone(),
                        balance_after: new_balance,
                        batch_number: first_batch,
                        allocations: consumed_batches.clone(),
                        created_by: actor,
                        created_at: now,
                    })
                    .await?;
                (Some(movement.id), None)
            }
        };

        tx.commit().await?;

        Ok(StockOutReceipt {
            new_balance,
            consumed_batches,
            movement_id,
            damage_id,
        })
    }

    /// Draw `{item_id}-NN` suffixes until one is free or the budget runs out
    async fn draw_batch_number(&self, tx: &mut dyn LedgerTx, item_id: &str) -> AppResult<String> {
        for _ in 0..self.config.batch_number_attempts {
            let suffix = rand::thread_rng().gen_range(0..BATCH_SUFFIX_SPACE);
            let candidate = format_batch_number(item_id, suffix);
            if !tx.batch_number_taken(&candidate).await? {
                return Ok(candidate);
            }
            tracing::debug!(item_id, candidate = %candidate, "Batch number taken, drawing again");
        }

        Err(AppError::Exhausted(format!(
            "No free batch number for item {} after {} attempts",
            item_id, self.config.batch_number_attempts
        )))
    }
}

fn total_remaining(batches: &[StockBatch]) -> i64 {
    batches.iter().map(|b| b.quantity_remaining).sum()
}

fn ensure_balanced(item_id: &str, item_quantity: i64, batch_total: i64) -> AppResult<()> {
    if item_quantity != batch_total {
        tracing::error!(
            item_id,
            item_quantity,
            batch_total,
            "Item quantity diverges from batch remainders"
        );
        return Err(AppError::Internal(format!(
            "Item {} quantity {} does not match batch total {}",
            item_id, item_quantity, batch_total
        )));
    }
    Ok(())
}
