//! PostgreSQL ledger store
//!
//! Writers serialize per item by taking `FOR UPDATE` on the item row first;
//! the item's active batches are then locked in FIFO order inside the same
//! transaction. `lock_timeout` bounds how long a writer waits for either.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{types::Json, FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use shared::{BatchDraw, BatchStatus, DamagedItem, Item, StockBatch, StockMovement, DAMAGE_REASON};

use super::{
    BatchFilter, BatchWithItem, DamageFilter, LedgerStore, LedgerTx, MovementFilter, NewBatch,
    NewDamage, NewMovement,
};
use crate::error::{AppError, AppResult};

const BATCH_COLUMNS: &str = "b.id, b.seq, b.item_id, b.batch_number, b.quantity_received, \
     b.quantity_remaining, b.status, b.reason, b.created_by, b.created_at";

/// Ledger store backed by a Postgres pool
#[derive(Clone)]
pub struct PgLedgerStore {
    db: PgPool,
    lock_timeout_ms: u64,
}

impl PgLedgerStore {
    pub fn new(db: PgPool, lock_timeout_ms: u64) -> Self {
        Self {
            db,
            lock_timeout_ms,
        }
    }
}

#[derive(Debug, FromRow)]
struct ItemRow {
    item_id: String,
    name: String,
    quantity: i64,
    updated_at: DateTime<Utc>,
}

impl From<ItemRow> for Item {
    fn from(row: ItemRow) -> Self {
        Item {
            item_id: row.item_id,
            name: row.name,
            quantity: row.quantity,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct BatchRow {
    id: Uuid,
    seq: i64,
    item_id: String,
    batch_number: String,
    quantity_received: i64,
    quantity_remaining: i64,
    status: String,
    reason: String,
    created_by: Uuid,
    created_at: DateTime<Utc>,
}

impl TryFrom<BatchRow> for StockBatch {
    type Error = AppError;

    fn try_from(row: BatchRow) -> Result<Self, Self::Error> {
        Ok(StockBatch {
            id: row.id,
            seq: row.seq,
            item_id: row.item_id,
            batch_number: row.batch_number,
            quantity_received: row.quantity_received,
            quantity_remaining: row.quantity_remaining,
            status: row
                .status
                .parse()
                .map_err(|e: shared::ParseEnumError| AppError::Internal(e.to_string()))?,
            reason: row.reason,
            created_by: row.created_by,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct BatchWithItemRow {
    #[sqlx(flatten)]
    batch: BatchRow,
    item_name: String,
}

#[derive(Debug, FromRow)]
struct MovementRow {
    id: Uuid,
    item_id: String,
    direction: String,
    quantity: i64,
    reason: String,
    balance_after: i64,
    batch_number: String,
    allocations: Json<Vec<BatchDraw>>,
    created_by: Uuid,
    created_at: DateTime<Utc>,
}

impl TryFrom<MovementRow> for StockMovement {
    type Error = AppError;

    fn try_from(row: MovementRow) -> Result<Self, Self::Error> {
        Ok(StockMovement {
            id: row.id,
            item_id: row.item_id,
            direction: row
                .direction
                .parse()
                .map_err(|e: shared::ParseEnumError| AppError::Internal(e.to_string()))?,
            quantity: row.quantity,
            reason: row.reason,
            balance_after: row.balance_after,
            batch_number: row.batch_number,
            allocations: row.allocations.0,
            created_by: row.created_by,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct DamageRow {
    id: Uuid,
    item_id: String,
    quantity: i64,
    damage_reason: String,
    batch_number: String,
    allocations: Json<Vec<BatchDraw>>,
    created_by: Uuid,
    created_at: DateTime<Utc>,
}

impl From<DamageRow> for DamagedItem {
    fn from(row: DamageRow) -> Self {
        DamagedItem {
            id: row.id,
            item_id: row.item_id,
            quantity: row.quantity,
            damage_reason: row.damage_reason,
            batch_number: row.batch_number,
            allocations: row.allocations.0,
            created_by: row.created_by,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn begin(&self) -> AppResult<Box<dyn LedgerTx>> {
        let mut tx = self.db.begin().await?;
        // SET cannot take bind parameters; the value is an integer from config
        let set_timeout = format!("SET LOCAL lock_timeout = {}", self.lock_timeout_ms);
        sqlx::query(&set_timeout).execute(&mut *tx).await?;
        Ok(Box::new(PgLedgerTx { tx }))
    }

    async fn find_item(&self, item_id: &str) -> AppResult<Option<Item>> {
        let row = sqlx::query_as::<_, ItemRow>(
            "SELECT item_id, name, quantity, updated_at FROM items WHERE item_id = $1",
        )
        .bind(item_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(Item::from))
    }

    async fn upsert_item(&self, item_id: &str, name: &str) -> AppResult<Item> {
        let row = sqlx::query_as::<_, ItemRow>(
            r#"
            INSERT INTO items (item_id, name)
            VALUES ($1, $2)
            ON CONFLICT (item_id) DO UPDATE SET name = EXCLUDED.name, updated_at = NOW()
            RETURNING item_id, name, quantity, updated_at
            "#,
        )
        .bind(item_id)
        .bind(name)
        .fetch_one(&self.db)
        .await?;

        Ok(row.into())
    }

    async fn list_batches(&self, filter: &BatchFilter) -> AppResult<Vec<BatchWithItem>> {
        let sql = format!(
            r#"
            SELECT {BATCH_COLUMNS}, i.name AS item_name
            FROM stock_batches b
            JOIN items i ON i.item_id = b.item_id
            WHERE ($1::text IS NULL OR b.item_id = $1)
              AND ($2::text IS NULL OR b.status = $2)
              AND ($3::timestamptz IS NULL OR b.created_at >= $3)
              AND ($4::timestamptz IS NULL OR b.created_at < $4)
            ORDER BY b.created_at ASC, b.seq ASC
            "#
        );
        let rows = sqlx::query_as::<_, BatchWithItemRow>(&sql)
            .bind(filter.item_id.as_deref())
            .bind(filter.status.map(|s| s.as_str()))
            .bind(filter.created.start_at())
            .bind(filter.created.end_before())
            .fetch_all(&self.db)
            .await?;

        rows.into_iter()
            .map(|row| -> AppResult<BatchWithItem> {
                Ok(BatchWithItem {
                    batch: row.batch.try_into()?,
                    item_name: row.item_name,
                })
            })
            .collect()
    }

    async fn list_movements(&self, filter: &MovementFilter) -> AppResult<Vec<StockMovement>> {
        let rows = sqlx::query_as::<_, MovementRow>(
            r#"
            SELECT id, item_id, direction, quantity, reason, balance_after, batch_number,
                   allocations, created_by, created_at
            FROM stock_movements
            WHERE ($1::text IS NULL OR item_id = $1)
              AND ($2::text IS NULL OR direction = $2)
              AND ($3::text IS NULL OR reason = $3)
              AND (NOT $4 OR reason <> $5)
              AND ($6::timestamptz IS NULL OR created_at >= $6)
              AND ($7::timestamptz IS NULL OR created_at < $7)
            ORDER BY created_at DESC, seq DESC
            LIMIT $8 OFFSET $9
            "#,
        )
        .bind(filter.item_id.as_deref())
        .bind(filter.direction.map(|d| d.as_str()))
        .bind(filter.reason.as_deref())
        .bind(filter.exclude_damage)
        .bind(DAMAGE_REASON)
        .bind(filter.created.start_at())
        .bind(filter.created.end_before())
        .bind(filter.page.limit())
        .bind(filter.page.offset())
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(StockMovement::try_from).collect()
    }

    async fn list_damages(&self, filter: &DamageFilter) -> AppResult<Vec<DamagedItem>> {
        let rows = sqlx::query_as::<_, DamageRow>(
            r#"
            SELECT id, item_id, quantity, damage_reason, batch_number, allocations,
                   created_by, created_at
            FROM damaged_items
            WHERE ($1::text IS NULL OR item_id = $1)
              AND ($2::timestamptz IS NULL OR created_at >= $2)
              AND ($3::timestamptz IS NULL OR created_at < $3)
            ORDER BY created_at DESC, seq DESC
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(filter.item_id.as_deref())
        .bind(filter.created.start_at())
        .bind(filter.created.end_before())
        .bind(filter.page.limit())
        .bind(filter.page.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(DamagedItem::from).collect())
    }

    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.db).await?;
        Ok(())
    }
}

struct PgLedgerTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LedgerTx for PgLedgerTx {
    async fn item_for_update(&mut self, item_id: &str) -> AppResult<Option<Item>> {
        let row = sqlx::query_as::<_, ItemRow>(
            "SELECT item_id, name, quantity, updated_at FROM items WHERE item_id = $1 FOR UPDATE",
        )
        .bind(item_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(Item::from))
    }

    async fn active_batches_for_update(&mut self, item_id: &str) -> AppResult<Vec<StockBatch>> {
        let sql = format!(
            r#"
            SELECT {BATCH_COLUMNS}
            FROM stock_batches b
            WHERE b.item_id = $1 AND b.status = 'active' AND b.quantity_remaining > 0
            ORDER BY b.created_at ASC, b.seq ASC
            FOR UPDATE
            "#
        );
        let rows = sqlx::query_as::<_, BatchRow>(&sql)
            .bind(item_id)
            .fetch_all(&mut *self.tx)
            .await?;

        rows.into_iter().map(StockBatch::try_from).collect()
    }

    async fn batch_for_update(&mut self, batch_id: Uuid) -> AppResult<Option<StockBatch>> {
        let sql = format!("SELECT {BATCH_COLUMNS} FROM stock_batches b WHERE b.id = $1 FOR UPDATE");
        let row = sqlx::query_as::<_, BatchRow>(&sql)
            .bind(batch_id)
            .fetch_optional(&mut *self.tx)
            .await?;

        row.map(StockBatch::try_from).transpose()
    }

    async fn batch_number_taken(&mut self, batch_number: &str) -> AppResult<bool> {
        // Deleted batches stay referenced by the append-only ledgers
        let taken = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(SELECT 1 FROM stock_batches WHERE batch_number = $1)
                OR EXISTS(
                    SELECT 1 FROM stock_movements
                    WHERE allocations @> jsonb_build_array(jsonb_build_object('batch_number', $1::text))
                )
                OR EXISTS(
                    SELECT 1 FROM damaged_items
                    WHERE allocations @> jsonb_build_array(jsonb_build_object('batch_number', $1::text))
                )
            "#,
        )
        .bind(batch_number)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(taken)
    }

    async fn insert_batch(&mut self, batch: NewBatch) -> AppResult<StockBatch> {
        let row = sqlx::query_as::<_, BatchRow>(
            r#"
            INSERT INTO stock_batches AS b (
                item_id, batch_number, quantity_received, quantity_remaining,
                status, reason, created_by, created_at
            )
            VALUES ($1, $2, $3, $3, 'active', $4, $5, $6)
            RETURNING b.id, b.seq, b.item_id, b.batch_number, b.quantity_received,
                      b.quantity_remaining, b.status, b.reason, b.created_by, b.created_at
            "#,
        )
        .bind(&batch.item_id)
        .bind(&batch.batch_number)
        .bind(batch.quantity)
        .bind(&batch.reason)
        .bind(batch.created_by)
        .bind(batch.created_at)
        .fetch_one(&mut *self.tx)
        .await?;

        row.try_into()
    }

    async fn update_batch(
        &mut self,
        batch_id: Uuid,
        quantity_remaining: i64,
        status: BatchStatus,
    ) -> AppResult<()> {
        // Remaining only ever decreases and an empty batch never reopens
        let result = sqlx::query(
            r#"
            UPDATE stock_batches
            SET quantity_remaining = $2, status = $3
            WHERE id = $1 AND quantity_remaining >= $2 AND status = 'active'
            "#,
        )
        .bind(batch_id)
        .bind(quantity_remaining)
        .bind(status.as_str())
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::Internal(format!(
                "batch {} could not be decremented to {}",
                batch_id, quantity_remaining
            )));
        }
        Ok(())
    }

    async fn delete_batch(&mut self, batch_id: Uuid) -> AppResult<()> {
        let result =
            sqlx::query("DELETE FROM stock_batches WHERE id = $1 AND quantity_remaining = 0")
                .bind(batch_id)
                .execute(&mut *self.tx)
                .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::Conflict {
                resource: "batch".to_string(),
                message: format!("Batch {} is missing or still holds stock", batch_id),
            });
        }
        Ok(())
    }

    async fn set_item_quantity(&mut self, item_id: &str, quantity: i64) -> AppResult<()> {
        let result =
            sqlx::query("UPDATE items SET quantity = $2, updated_at = NOW() WHERE item_id = $1")
                .bind(item_id)
                .bind(quantity)
                .execute(&mut *self.tx)
                .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Item {}", item_id)));
        }
        Ok(())
    }

    async fn append_movement(&mut self, movement: NewMovement) -> AppResult<StockMovement> {
        let row = sqlx::query_as::<_, MovementRow>(
            r#"
            INSERT INTO stock_movements (
                item_id, direction, quantity, reason, balance_after, batch_number,
                allocations, created_by, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id, item_id, direction, quantity, reason, balance_after, batch_number,
                      allocations, created_by, created_at
            "#,
        )
        .bind(&movement.item_id)
        .bind(movement.direction.as_str())
        .bind(movement.quantity)
        .bind(&movement.reason)
        .bind(movement.balance_after)
        .bind(&movement.batch_number)
        .bind(Json(&movement.allocations))
        .bind(movement.created_by)
        .bind(movement.created_at)
        .fetch_one(&mut *self.tx)
        .await?;

        row.try_into()
    }

    async fn append_damage(&mut self, damage: NewDamage) -> AppResult<DamagedItem> {
        let row = sqlx::query_as::<_, DamageRow>(
            r#"
            INSERT INTO damaged_items (
                item_id, quantity, damage_reason, batch_number, allocations,
                created_by, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, item_id, quantity, damage_reason, batch_number, allocations,
                      created_by, created_at
            "#,
        )
        .bind(&damage.item_id)
        .bind(damage.quantity)
        .bind(&damage.damage_reason)
        .bind(&damage.batch_number)
        .bind(Json(&damage.allocations))
        .bind(damage.created_by)
        .bind(damage.created_at)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(row.into())
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
