use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use shared::{
    BatchDraw, BatchStatus, DamagedItem, Item, Pagination, StockBatch, StockMovement, DAMAGE_REASON,
};

use super::{
    BatchFilter, BatchWithItem, DamageFilter, LedgerStore, LedgerTx, MovementFilter, NewBatch,
    NewDamage, NewMovement,
};
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Default)]
struct State {
    items: BTreeMap<String, Item>,
    batches: Vec<StockBatch>,
    movements: Vec<StockMovement>,
    damages: Vec<DamagedItem>,
    next_seq: i64,
}

/// In-memory ledger store.
///
/// Intended for tests/dev. A transaction holds the store-wide lock for its
/// whole lifetime and works on a copy that replaces the state on commit.
#[derive(Debug, Clone, Default)]
pub struct MemoryLedgerStore {
    state: Arc<Mutex<State>>,
    failing_commits: Arc<AtomicU32>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` commits fail with a transient storage error
    pub fn fail_next_commits(&self, count: u32) {
        self.failing_commits.store(count, Ordering::SeqCst);
    }

    /// Every batch of an item, oldest first, regardless of status
    pub async fn batches_of(&self, item_id: &str) -> Vec<StockBatch> {
        let state = self.state.lock().await;
        let mut batches: Vec<_> = state
            .batches
            .iter()
            .filter(|b| b.item_id == item_id)
            .cloned()
            .collect();
        batches.sort_by(|a, b| a.fifo_cmp(b));
        batches
    }

    fn take_commit_failure(&self) -> bool {
        self.failing_commits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

fn paginate<T>(rows: Vec<T>, page: &Pagination) -> Vec<T> {
    rows.into_iter()
        .skip(page.offset() as usize)
        .take(page.limit() as usize)
        .collect()
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn begin(&self) -> AppResult<Box<dyn LedgerTx>> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTx {
            guard,
            working,
            store: self.clone(),
        }))
    }

    async fn find_item(&self, item_id: &str) -> AppResult<Option<Item>> {
        Ok(self.state.lock().await.items.get(item_id).cloned())
    }

    async fn upsert_item(&self, item_id: &str, name: &str) -> AppResult<Item> {
        let mut state = self.state.lock().await;
        let item = state
            .items
            .entry(item_id.to_string())
            .or_insert_with(|| Item {
                item_id: item_id.to_string(),
                name: String::new(),
                quantity: 0,
                updated_at: Utc::now(),
            });
        item.name = name.to_string();
        item.updated_at = Utc::now();
        Ok(item.clone())
    }

    async fn list_batches(&self, filter: &BatchFilter) -> AppResult<Vec<BatchWithItem>> {
        let state = self.state.lock().await;
        let mut rows: Vec<_> = state
            .batches
            .iter()
            .filter(|b| filter.item_id.as_deref().map_or(true, |id| b.item_id == id))
            .filter(|b| filter.status.map_or(true, |s| b.status == s))
            .filter(|b| filter.created.contains(b.created_at))
            .map(|b| BatchWithItem {
                batch: b.clone(),
                item_name: state
                    .items
                    .get(&b.item_id)
                    .map(|i| i.name.clone())
                    .unwrap_or_default(),
            })
            .collect();
        rows.sort_by(|a, b| a.batch.fifo_cmp(&b.batch));
        Ok(rows)
    }

    async fn list_movements(&self, filter: &MovementFilter) -> AppResult<Vec<StockMovement>> {
        let state = self.state.lock().await;
        let mut rows: Vec<_> = state
            .movements
            .iter()
            .filter(|m| filter.item_id.as_deref().map_or(true, |id| m.item_id == id))
            .filter(|m| filter.direction.map_or(true, |d| m.direction == d))
            .filter(|m| filter.reason.as_deref().map_or(true, |r| m.reason == r))
            .filter(|m| !(filter.exclude_damage && m.reason == DAMAGE_REASON))
            .filter(|m| filter.created.contains(m.created_at))
            .cloned()
            .collect();
        // Appended in commit order, so newest-first is the reverse
        rows.reverse();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paginate(rows, &filter.page))
    }

    async fn list_damages(&self, filter: &DamageFilter) -> AppResult<Vec<DamagedItem>> {
        let state = self.state.lock().await;
        let mut rows: Vec<_> = state
            .damages
            .iter()
            .filter(|d| filter.item_id.as_deref().map_or(true, |id| d.item_id == id))
            .filter(|d| filter.created.contains(d.created_at))
            .cloned()
            .collect();
        rows.reverse();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paginate(rows, &filter.page))
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}

struct MemoryTx {
    guard: OwnedMutexGuard<State>,
    working: State,
    store: MemoryLedgerStore,
}

impl MemoryTx {
    fn batch_mut(&mut self, batch_id: Uuid) -> AppResult<&mut StockBatch> {
        self.working
            .batches
            .iter_mut()
            .find(|b| b.id == batch_id)
            .ok_or_else(|| AppError::NotFound(format!("Batch {}", batch_id)))
    }
}

#[async_trait]
impl LedgerTx for MemoryTx {
    async fn item_for_update(&mut self, item_id: &str) -> AppResult<Option<Item>> {
        Ok(self.working.items.get(item_id).cloned())
    }

    async fn active_batches_for_update(&mut self, item_id: &str) -> AppResult<Vec<StockBatch>> {
        let mut batches: Vec<_> = self
            .working
            .batches
            .iter()
            .filter(|b| b.item_id == item_id && b.is_available())
            .cloned()
            .collect();
        batches.sort_by(|a, b| a.fifo_cmp(b));
        Ok(batches)
    }

    async fn batch_for_update(&mut self, batch_id: Uuid) -> AppResult<Option<StockBatch>> {
        Ok(self
            .working
            .batches
            .iter()
            .find(|b| b.id == batch_id)
            .cloned())
    }

    async fn batch_number_taken(&mut self, batch_number: &str) -> AppResult<bool> {
        let referenced = |draws: &[BatchDraw]| draws.iter().any(|d| d.batch_number == batch_number);
        let state = &self.working;
        Ok(state.batches.iter().any(|b| b.batch_number == batch_number)
            || state.movements.iter().any(|m| referenced(&m.allocations))
            || state.damages.iter().any(|d| referenced(&d.allocations)))
    }

    async fn insert_batch(&mut self, batch: NewBatch) -> AppResult<StockBatch> {
        if !self.working.items.contains_key(&batch.item_id) {
            return Err(AppError::NotFound(format!("Item {}", batch.item_id)));
        }
        if self
            .working
            .batches
            .iter()
            .any(|b| b.batch_number == batch.batch_number)
        {
            return Err(AppError::Conflict {
                resource: "batch_number".to_string(),
                message: format!("Batch number {} already exists", batch.batch_number),
            });
        }

        self.working.next_seq += 1;
        let created = StockBatch {
            id: Uuid::new_v4(),
            seq: self.working.next_seq,
            item_id: batch.item_id,
            batch_number: batch.batch_number,
            quantity_received: batch.quantity,
            quantity_remaining: batch.quantity,
            status: BatchStatus::Active,
            reason: batch.reason,
            created_by: batch.created_by,
            created_at: batch.created_at,
        };
        self.working.batches.push(created.clone());
        Ok(created)
    }

    async fn update_batch(
        &mut self,
        batch_id: Uuid,
        quantity_remaining: i64,
        status: BatchStatus,
    ) -> AppResult<()> {
        let batch = self.batch_mut(batch_id)?;
        if quantity_remaining < 0 || quantity_remaining > batch.quantity_remaining {
            return Err(AppError::Internal(format!(
                "batch {} remaining may only decrease ({} -> {})",
                batch.batch_number, batch.quantity_remaining, quantity_remaining
            )));
        }
        if batch.status == BatchStatus::Empty && status == BatchStatus::Active {
            return Err(AppError::Internal(format!(
                "batch {} cannot return from empty to active",
                batch.batch_number
            )));
        }
        batch.quantity_remaining = quantity_remaining;
        batch.status = status;
        Ok(())
    }

    async fn delete_batch(&mut self, batch_id: Uuid) -> AppResult<()> {
        let before = self.working.batches.len();
        self.working
            .batches
            .retain(|b| !(b.id == batch_id && b.quantity_remaining == 0));
        if self.working.batches.len() == before {
            return Err(AppError::Conflict {
                resource: "batch".to_string(),
                message: format!("Batch {} is missing or still holds stock", batch_id),
            });
        }
        Ok(())
    }

    async fn set_item_quantity(&mut self, item_id: &str, quantity: i64) -> AppResult<()> {
        if quantity < 0 {
            return Err(AppError::Internal(format!(
                "item {} quantity would become negative ({})",
                item_id, quantity
            )));
        }
        let item = self
            .working
            .items
            .get_mut(item_id)
            .ok_or_else(|| AppError::NotFound(format!("Item {}", item_id)))?;
        item.quantity = quantity;
        item.updated_at = Utc::now();
        Ok(())
    }

    async fn append_movement(&mut self, movement: NewMovement) -> AppResult<StockMovement> {
        let record = StockMovement {
            id: Uuid::new_v4(),
            item_id: movement.item_id,
            direction: movement.direction,
            quantity: movement.quantity,
            reason: movement.reason,
            balance_after: movement.balance_after,
            batch_number: movement.batch_number,
            allocations: movement.allocations,
            created_by: movement.created_by,
            created_at: movement.created_at,
        };
        self.working.movements.push(record.clone());
        Ok(record)
    }

    async fn append_damage(&mut self, damage: NewDamage) -> AppResult<DamagedItem> {
        let record = DamagedItem {
            id: Uuid::new_v4(),
            item_id: damage.item_id,
            quantity: damage.quantity,
            damage_reason: damage.damage_reason,
            batch_number: damage.batch_number,
            allocations: damage.allocations,
            created_by: damage.created_by,
            created_at: damage.created_at,
        };
        self.working.damages.push(record.clone());
        Ok(record)
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let MemoryTx {
            mut guard,
            working,
            store,
        } = *self;
        if store.take_commit_failure() {
            return Err(AppError::StorageFailure(
                "could not serialize access due to concurrent update".to_string(),
            ));
        }
        *guard = working;
        Ok(())
    }
}
