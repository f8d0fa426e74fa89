//! Storage seam for the ledger
//!
//! Writers go through [`LedgerTx`]: one transaction per stock-in, stock-out or
//! batch deletion. A transaction that is dropped without `commit` leaves no
//! trace. Readers use the non-transactional query methods on [`LedgerStore`].

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use shared::{
    BatchDraw, BatchStatus, DamagedItem, DateRange, Direction, Item, Pagination, StockBatch,
    StockMovement,
};

use crate::error::AppResult;

pub use memory::MemoryLedgerStore;
pub use postgres::PgLedgerStore;

/// Fields of a batch about to be created
#[derive(Debug, Clone)]
pub struct NewBatch {
    pub item_id: String,
    pub batch_number: String,
    pub quantity: i64,
    pub reason: String,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewMovement {
    pub item_id: String,
    pub direction: Direction,
    pub quantity: i64,
    pub reason: String,
    pub balance_after: i64,
    pub batch_number: String,
    pub allocations: Vec<BatchDraw>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewDamage {
    pub item_id: String,
    pub quantity: i64,
    pub damage_reason: String,
    pub batch_number: String,
    pub allocations: Vec<BatchDraw>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Batch listing filter. Results are ordered oldest first.
#[derive(Debug, Clone, Default)]
pub struct BatchFilter {
    pub item_id: Option<String>,
    pub status: Option<BatchStatus>,
    pub created: DateRange,
}

/// Movement log filter. Results are ordered newest first.
#[derive(Debug, Clone, Default)]
pub struct MovementFilter {
    pub item_id: Option<String>,
    pub direction: Option<Direction>,
    pub reason: Option<String>,
    pub created: DateRange,
    /// Hide rows carrying the damage reason
    pub exclude_damage: bool,
    pub page: Pagination,
}

/// Damage ledger filter. Results are ordered newest first.
#[derive(Debug, Clone, Default)]
pub struct DamageFilter {
    pub item_id: Option<String>,
    pub created: DateRange,
    pub page: Pagination,
}

/// A batch together with its item's display name
#[derive(Debug, Clone)]
pub struct BatchWithItem {
    pub batch: StockBatch,
    pub item_name: String,
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Open a write transaction
    async fn begin(&self) -> AppResult<Box<dyn LedgerTx>>;

    async fn find_item(&self, item_id: &str) -> AppResult<Option<Item>>;

    /// Register an item at quantity 0, or rename an existing one
    async fn upsert_item(&self, item_id: &str, name: &str) -> AppResult<Item>;

    async fn list_batches(&self, filter: &BatchFilter) -> AppResult<Vec<BatchWithItem>>;

    async fn list_movements(&self, filter: &MovementFilter) -> AppResult<Vec<StockMovement>>;

    async fn list_damages(&self, filter: &DamageFilter) -> AppResult<Vec<DamagedItem>>;

    /// Cheap connectivity check for the health endpoint
    async fn ping(&self) -> AppResult<()>;
}

/// One atomic unit of ledger writes.
///
/// Rows read through the `*_for_update` methods stay locked until the
/// transaction ends.
#[async_trait]
pub trait LedgerTx: Send {
    async fn item_for_update(&mut self, item_id: &str) -> AppResult<Option<Item>>;

    /// Active batches with stock remaining, oldest first (`created_at`, `seq`)
    async fn active_batches_for_update(&mut self, item_id: &str) -> AppResult<Vec<StockBatch>>;

    async fn batch_for_update(&mut self, batch_id: Uuid) -> AppResult<Option<StockBatch>>;

    async fn batch_number_taken(&mut self, batch_number: &str) -> AppResult<bool>;

    async fn insert_batch(&mut self, batch: NewBatch) -> AppResult<StockBatch>;

    async fn update_batch(
        &mut self,
        batch_id: Uuid,
        quantity_remaining: i64,
        status: BatchStatus,
    ) -> AppResult<()>;

    async fn delete_batch(&mut self, batch_id: Uuid) -> AppResult<()>;

    async fn set_item_quantity(&mut self, item_id: &str, quantity: i64) -> AppResult<()>;

    async fn append_movement(&mut self, movement: NewMovement) -> AppResult<StockMovement>;

    async fn append_damage(&mut self, damage: NewDamage) -> AppResult<DamagedItem>;

    async fn commit(self: Box<Self>) -> AppResult<()>;
}
