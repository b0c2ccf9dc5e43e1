//! PostgreSQL-backed store implementations.
//!
//! The SQL lives in free functions over `&mut PgConnection` so the
//! pool-backed stores here and the transaction-scoped stores in
//! [`crate::scope`] share one implementation of every query.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use common::{ProductId, Quantity, TenantId, WarehouseId};
use domain::{
    BatchId, InventoryError, InventoryItem, ItemId, ItemRecord, LedgerEntry, LedgerEntryType,
    LockId, LockRecord, SourceRef, StockBatch, StockLock, Version,
};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::store::{InventoryItemStore, LedgerStore, StockBatchStore, StockLockStore};

/// Runs the database migrations.
pub async fn run_migrations(pool: &PgPool) -> std::result::Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../migrations").run(pool).await
}

fn row_to_item(row: PgRow) -> Result<InventoryItem> {
    let available =
        Quantity::new(row.try_get("available_quantity")?).map_err(InventoryError::from)?;
    let locked = Quantity::new(row.try_get("locked_quantity")?).map_err(InventoryError::from)?;
    let min_quantity = Quantity::new(row.try_get("min_quantity")?).map_err(InventoryError::from)?;
    let max_quantity = Quantity::new(row.try_get("max_quantity")?).map_err(InventoryError::from)?;

    Ok(InventoryItem::from_record(ItemRecord {
        id: ItemId::from_uuid(row.try_get::<Uuid, _>("id")?),
        tenant_id: TenantId::from_uuid(row.try_get::<Uuid, _>("tenant_id")?),
        warehouse_id: WarehouseId::from_uuid(row.try_get::<Uuid, _>("warehouse_id")?),
        product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
        available,
        locked,
        unit_cost: row.try_get("unit_cost")?,
        min_quantity,
        max_quantity,
        version: Version::new(row.try_get("version")?),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    }))
}

fn row_to_lock(row: PgRow) -> Result<StockLock> {
    let quantity = Quantity::new(row.try_get("quantity")?).map_err(InventoryError::from)?;
    let source = SourceRef::new(
        row.try_get::<String, _>("source_type")?,
        row.try_get::<String, _>("source_id")?,
    )?;

    Ok(StockLock::from_record(LockRecord {
        id: LockId::from_uuid(row.try_get::<Uuid, _>("id")?),
        item_id: ItemId::from_uuid(row.try_get::<Uuid, _>("inventory_item_id")?),
        quantity,
        source,
        expire_at: row.try_get("expire_at")?,
        released: row.try_get("released")?,
        consumed: row.try_get("consumed")?,
        created_at: row.try_get("created_at")?,
        released_at: row.try_get("released_at")?,
    }))
}

fn row_to_entry(row: PgRow) -> Result<LedgerEntry> {
    let entry_type = LedgerEntryType::parse(row.try_get::<String, _>("entry_type")?.as_str())?;
    let quantity = Quantity::new(row.try_get("quantity")?).map_err(InventoryError::from)?;
    let balance_before =
        Quantity::new(row.try_get("balance_before")?).map_err(InventoryError::from)?;
    let balance_after =
        Quantity::new(row.try_get("balance_after")?).map_err(InventoryError::from)?;
    let source = SourceRef::new(
        row.try_get::<String, _>("source_type")?,
        row.try_get::<String, _>("source_id")?,
    )?;

    Ok(LedgerEntry {
        id: domain::EntryId::from_uuid(row.try_get::<Uuid, _>("id")?),
        tenant_id: TenantId::from_uuid(row.try_get::<Uuid, _>("tenant_id")?),
        item_id: ItemId::from_uuid(row.try_get::<Uuid, _>("inventory_item_id")?),
        warehouse_id: WarehouseId::from_uuid(row.try_get::<Uuid, _>("warehouse_id")?),
        product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
        entry_type,
        quantity,
        unit_cost: row.try_get("unit_cost")?,
        balance_before,
        balance_after,
        source,
        lock_id: row
            .try_get::<Option<Uuid>, _>("lock_id")?
            .map(LockId::from_uuid),
        occurred_at: row.try_get("occurred_at")?,
    })
}

const ITEM_COLUMNS: &str = "id, tenant_id, warehouse_id, product_id, available_quantity, \
     locked_quantity, unit_cost, min_quantity, max_quantity, version, created_at, updated_at";

const LOCK_COLUMNS: &str = "id, inventory_item_id, quantity, source_type, source_id, expire_at, \
     released, consumed, created_at, released_at";

const LEDGER_COLUMNS: &str = "id, tenant_id, inventory_item_id, warehouse_id, product_id, \
     entry_type, quantity, unit_cost, balance_before, balance_after, source_type, source_id, \
     lock_id, occurred_at";

const BATCH_COLUMNS: &str = "id, inventory_item_id, batch_number, production_date, expiry_date, \
     quantity, unit_cost, consumed, created_at, updated_at";

pub(crate) async fn fetch_item(conn: &mut PgConnection, id: ItemId) -> Result<InventoryItem> {
    let row = sqlx::query(&format!(
        "SELECT {ITEM_COLUMNS} FROM inventory_items WHERE id = $1"
    ))
    .bind(id.as_uuid())
    .fetch_optional(&mut *conn)
    .await?;

    row.map(row_to_item)
        .transpose()?
        .ok_or(StoreError::ItemNotFound(id))
}

pub(crate) async fn fetch_item_by_key(
    conn: &mut PgConnection,
    tenant_id: TenantId,
    warehouse_id: WarehouseId,
    product_id: ProductId,
) -> Result<InventoryItem> {
    let row = sqlx::query(&format!(
        "SELECT {ITEM_COLUMNS} FROM inventory_items \
         WHERE tenant_id = $1 AND warehouse_id = $2 AND product_id = $3"
    ))
    .bind(tenant_id.as_uuid())
    .bind(warehouse_id.as_uuid())
    .bind(product_id.as_uuid())
    .fetch_optional(&mut *conn)
    .await?;

    row.map(row_to_item)
        .transpose()?
        .ok_or(StoreError::ItemKeyNotFound {
            tenant_id,
            warehouse_id,
            product_id,
        })
}

pub(crate) async fn get_or_create_item(
    conn: &mut PgConnection,
    tenant_id: TenantId,
    warehouse_id: WarehouseId,
    product_id: ProductId,
) -> Result<InventoryItem> {
    match fetch_item_by_key(&mut *conn, tenant_id, warehouse_id, product_id).await {
        Ok(item) => return Ok(item),
        Err(StoreError::ItemKeyNotFound { .. }) => {}
        Err(e) => return Err(e),
    }

    // Insert-if-absent keyed on the unique triple. The loser of a creation
    // race gets zero rows affected and re-reads the winner's row.
    let item = InventoryItem::new(tenant_id, warehouse_id, product_id);
    let record = item.to_record();
    let inserted = sqlx::query(
        "INSERT INTO inventory_items (id, tenant_id, warehouse_id, product_id, \
         available_quantity, locked_quantity, unit_cost, min_quantity, max_quantity, \
         version, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
         ON CONFLICT (tenant_id, warehouse_id, product_id) DO NOTHING",
    )
    .bind(record.id.as_uuid())
    .bind(record.tenant_id.as_uuid())
    .bind(record.warehouse_id.as_uuid())
    .bind(record.product_id.as_uuid())
    .bind(record.available.as_decimal())
    .bind(record.locked.as_decimal())
    .bind(record.unit_cost)
    .bind(record.min_quantity.as_decimal())
    .bind(record.max_quantity.as_decimal())
    .bind(record.version.as_i64())
    .bind(record.created_at)
    .bind(record.updated_at)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    if inserted == 1 {
        Ok(item)
    } else {
        fetch_item_by_key(conn, tenant_id, warehouse_id, product_id).await
    }
}

pub(crate) async fn upsert_item(conn: &mut PgConnection, item: &InventoryItem) -> Result<()> {
    let record = item.to_record();
    sqlx::query(
        "INSERT INTO inventory_items (id, tenant_id, warehouse_id, product_id, \
         available_quantity, locked_quantity, unit_cost, min_quantity, max_quantity, \
         version, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
         ON CONFLICT (id) DO UPDATE SET \
         available_quantity = EXCLUDED.available_quantity, \
         locked_quantity = EXCLUDED.locked_quantity, \
         unit_cost = EXCLUDED.unit_cost, \
         min_quantity = EXCLUDED.min_quantity, \
         max_quantity = EXCLUDED.max_quantity, \
         version = EXCLUDED.version, \
         updated_at = EXCLUDED.updated_at",
    )
    .bind(record.id.as_uuid())
    .bind(record.tenant_id.as_uuid())
    .bind(record.warehouse_id.as_uuid())
    .bind(record.product_id.as_uuid())
    .bind(record.available.as_decimal())
    .bind(record.locked.as_decimal())
    .bind(record.unit_cost)
    .bind(record.min_quantity.as_decimal())
    .bind(record.max_quantity.as_decimal())
    .bind(record.version.as_i64())
    .bind(record.created_at)
    .bind(record.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub(crate) async fn update_item_guarded(
    conn: &mut PgConnection,
    item: &InventoryItem,
) -> Result<()> {
    let base_version = item.version().prev();
    let record = item.to_record();
    let updated = sqlx::query(
        "UPDATE inventory_items SET \
         available_quantity = $2, locked_quantity = $3, unit_cost = $4, \
         min_quantity = $5, max_quantity = $6, version = $7, updated_at = $8 \
         WHERE id = $1 AND version = $9",
    )
    .bind(record.id.as_uuid())
    .bind(record.available.as_decimal())
    .bind(record.locked.as_decimal())
    .bind(record.unit_cost)
    .bind(record.min_quantity.as_decimal())
    .bind(record.max_quantity.as_decimal())
    .bind(record.version.as_i64())
    .bind(record.updated_at)
    .bind(base_version.as_i64())
    .execute(&mut *conn)
    .await?
    .rows_affected();

    if updated == 0 {
        metrics::counter!("inventory_cas_conflicts_total").increment(1);
        tracing::warn!(
            item_id = %item.id(),
            base_version = base_version.as_i64(),
            "optimistic lock conflict, caller must reload and retry"
        );
        return Err(StoreError::ConcurrencyConflict {
            item_id: item.id(),
            base_version,
        });
    }
    Ok(())
}

pub(crate) async fn list_items_by_warehouse(
    conn: &mut PgConnection,
    tenant_id: TenantId,
    warehouse_id: WarehouseId,
) -> Result<Vec<InventoryItem>> {
    let rows = sqlx::query(&format!(
        "SELECT {ITEM_COLUMNS} FROM inventory_items \
         WHERE tenant_id = $1 AND warehouse_id = $2 ORDER BY created_at"
    ))
    .bind(tenant_id.as_uuid())
    .bind(warehouse_id.as_uuid())
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter().map(row_to_item).collect()
}

pub(crate) async fn list_items_below_minimum(
    conn: &mut PgConnection,
    tenant_id: TenantId,
) -> Result<Vec<InventoryItem>> {
    let rows = sqlx::query(&format!(
        "SELECT {ITEM_COLUMNS} FROM inventory_items \
         WHERE tenant_id = $1 AND min_quantity > 0 \
         AND (available_quantity + locked_quantity) < min_quantity \
         ORDER BY created_at"
    ))
    .bind(tenant_id.as_uuid())
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter().map(row_to_item).collect()
}

pub(crate) async fn sum_quantity_by_product(
    conn: &mut PgConnection,
    tenant_id: TenantId,
    product_id: ProductId,
) -> Result<Decimal> {
    let total: Decimal = sqlx::query_scalar(
        "SELECT COALESCE(SUM(available_quantity + locked_quantity), 0) \
         FROM inventory_items WHERE tenant_id = $1 AND product_id = $2",
    )
    .bind(tenant_id.as_uuid())
    .bind(product_id.as_uuid())
    .fetch_one(&mut *conn)
    .await?;
    Ok(total)
}

pub(crate) async fn fetch_lock(conn: &mut PgConnection, id: LockId) -> Result<StockLock> {
    let row = sqlx::query(&format!(
        "SELECT {LOCK_COLUMNS} FROM stock_locks WHERE id = $1"
    ))
    .bind(id.as_uuid())
    .fetch_optional(&mut *conn)
    .await?;

    row.map(row_to_lock)
        .transpose()?
        .ok_or(StoreError::LockNotFound(id))
}

pub(crate) async fn list_locks_by_item(
    conn: &mut PgConnection,
    item_id: ItemId,
) -> Result<Vec<StockLock>> {
    let rows = sqlx::query(&format!(
        "SELECT {LOCK_COLUMNS} FROM stock_locks \
         WHERE inventory_item_id = $1 ORDER BY created_at"
    ))
    .bind(item_id.as_uuid())
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter().map(row_to_lock).collect()
}

pub(crate) async fn list_active_locks(
    conn: &mut PgConnection,
    item_id: ItemId,
) -> Result<Vec<StockLock>> {
    let rows = sqlx::query(&format!(
        "SELECT {LOCK_COLUMNS} FROM stock_locks \
         WHERE inventory_item_id = $1 AND released = FALSE AND consumed = FALSE \
         ORDER BY created_at"
    ))
    .bind(item_id.as_uuid())
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter().map(row_to_lock).collect()
}

pub(crate) async fn list_expired_locks(
    conn: &mut PgConnection,
    now: DateTime<Utc>,
) -> Result<Vec<StockLock>> {
    let rows = sqlx::query(&format!(
        "SELECT {LOCK_COLUMNS} FROM stock_locks \
         WHERE expire_at < $1 AND released = FALSE AND consumed = FALSE \
         ORDER BY expire_at"
    ))
    .bind(now)
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter().map(row_to_lock).collect()
}

pub(crate) async fn list_locks_by_source(
    conn: &mut PgConnection,
    source_type: &str,
    source_id: &str,
) -> Result<Vec<StockLock>> {
    let rows = sqlx::query(&format!(
        "SELECT {LOCK_COLUMNS} FROM stock_locks \
         WHERE source_type = $1 AND source_id = $2 ORDER BY created_at"
    ))
    .bind(source_type)
    .bind(source_id)
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter().map(row_to_lock).collect()
}

pub(crate) async fn upsert_lock(conn: &mut PgConnection, lock: &StockLock) -> Result<()> {
    let record = lock.to_record();
    sqlx::query(
        "INSERT INTO stock_locks (id, inventory_item_id, quantity, source_type, source_id, \
         expire_at, released, consumed, created_at, released_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
         ON CONFLICT (id) DO UPDATE SET \
         released = EXCLUDED.released, \
         consumed = EXCLUDED.consumed, \
         released_at = EXCLUDED.released_at",
    )
    .bind(record.id.as_uuid())
    .bind(record.item_id.as_uuid())
    .bind(record.quantity.as_decimal())
    .bind(record.source.source_type())
    .bind(record.source.source_id())
    .bind(record.expire_at)
    .bind(record.released)
    .bind(record.consumed)
    .bind(record.created_at)
    .bind(record.released_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Releases every expired active lock and returns the reserved quantity to
/// the owning items. Must run inside a transaction supplied by the caller.
pub(crate) async fn release_expired_locks(
    conn: &mut PgConnection,
    now: DateTime<Utc>,
) -> Result<u64> {
    // Take the owning item rows first, in the same item-then-lock order the
    // writers use. A concurrent unlock or deduct of a just-expired lock
    // either commits before this (the flip below then skips the lock) or
    // blocks on the item row until the sweep commits and fails its version
    // check. Flipping lock rows before touching items would let the two
    // interleave and restore the same quantity twice.
    let item_ids: Vec<Uuid> = sqlx::query_scalar(
        "SELECT id FROM inventory_items WHERE id IN (\
         SELECT DISTINCT inventory_item_id FROM stock_locks \
         WHERE expire_at < $1 AND released = FALSE AND consumed = FALSE) \
         ORDER BY id FOR UPDATE",
    )
    .bind(now)
    .fetch_all(&mut *conn)
    .await?;
    if item_ids.is_empty() {
        return Ok(0);
    }

    let rows = sqlx::query(
        "UPDATE stock_locks SET released = TRUE, released_at = $1 \
         WHERE expire_at < $1 AND released = FALSE AND consumed = FALSE \
         AND inventory_item_id = ANY($2) \
         RETURNING inventory_item_id, quantity",
    )
    .bind(now)
    .bind(&item_ids)
    .fetch_all(&mut *conn)
    .await?;

    // One quantity/version update per owning item, version advanced once
    // per released lock to match the aggregate's bookkeeping.
    let mut per_item: HashMap<Uuid, (Decimal, i64)> = HashMap::new();
    for row in &rows {
        let item_id: Uuid = row.try_get("inventory_item_id")?;
        let quantity: Decimal = row.try_get("quantity")?;
        let entry = per_item.entry(item_id).or_insert((Decimal::ZERO, 0));
        entry.0 += quantity;
        entry.1 += 1;
    }

    for (item_id, (quantity, lock_count)) in per_item {
        sqlx::query(
            "UPDATE inventory_items SET \
             available_quantity = available_quantity + $2, \
             locked_quantity = locked_quantity - $2, \
             version = version + $3, updated_at = $4 \
             WHERE id = $1",
        )
        .bind(item_id)
        .bind(quantity)
        .bind(lock_count)
        .bind(now)
        .execute(&mut *conn)
        .await?;
    }

    let released = rows.len() as u64;
    if released > 0 {
        metrics::counter!("stock_locks_released_total").increment(released);
        tracing::debug!(released, "expired stock locks swept");
    }
    Ok(released)
}

fn row_to_batch(row: PgRow) -> Result<StockBatch> {
    let quantity = Quantity::new(row.try_get("quantity")?).map_err(InventoryError::from)?;

    Ok(StockBatch {
        id: BatchId::from_uuid(row.try_get::<Uuid, _>("id")?),
        item_id: ItemId::from_uuid(row.try_get::<Uuid, _>("inventory_item_id")?),
        batch_number: row.try_get("batch_number")?,
        production_date: row.try_get("production_date")?,
        expiry_date: row.try_get("expiry_date")?,
        quantity,
        unit_cost: row.try_get("unit_cost")?,
        consumed: row.try_get("consumed")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

pub(crate) async fn fetch_batch(conn: &mut PgConnection, id: BatchId) -> Result<StockBatch> {
    let row = sqlx::query(&format!(
        "SELECT {BATCH_COLUMNS} FROM stock_batches WHERE id = $1"
    ))
    .bind(id.as_uuid())
    .fetch_optional(&mut *conn)
    .await?;

    row.map(row_to_batch)
        .transpose()?
        .ok_or(StoreError::BatchNotFound(id))
}

pub(crate) async fn list_batches_by_item(
    conn: &mut PgConnection,
    item_id: ItemId,
) -> Result<Vec<StockBatch>> {
    let rows = sqlx::query(&format!(
        "SELECT {BATCH_COLUMNS} FROM stock_batches \
         WHERE inventory_item_id = $1 ORDER BY created_at"
    ))
    .bind(item_id.as_uuid())
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter().map(row_to_batch).collect()
}

pub(crate) async fn list_available_batches(
    conn: &mut PgConnection,
    item_id: ItemId,
    on: NaiveDate,
) -> Result<Vec<StockBatch>> {
    let rows = sqlx::query(&format!(
        "SELECT {BATCH_COLUMNS} FROM stock_batches \
         WHERE inventory_item_id = $1 AND consumed = FALSE \
         AND (expiry_date IS NULL OR expiry_date >= $2) \
         ORDER BY expiry_date ASC NULLS LAST, created_at"
    ))
    .bind(item_id.as_uuid())
    .bind(on)
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter().map(row_to_batch).collect()
}

pub(crate) async fn list_batches_by_number(
    conn: &mut PgConnection,
    item_id: ItemId,
    batch_number: &str,
) -> Result<Vec<StockBatch>> {
    let rows = sqlx::query(&format!(
        "SELECT {BATCH_COLUMNS} FROM stock_batches \
         WHERE inventory_item_id = $1 AND batch_number = $2 ORDER BY created_at"
    ))
    .bind(item_id.as_uuid())
    .bind(batch_number)
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter().map(row_to_batch).collect()
}

pub(crate) async fn upsert_batch(conn: &mut PgConnection, batch: &StockBatch) -> Result<()> {
    sqlx::query(
        "INSERT INTO stock_batches (id, inventory_item_id, batch_number, production_date, \
         expiry_date, quantity, unit_cost, consumed, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
         ON CONFLICT (id) DO UPDATE SET \
         quantity = EXCLUDED.quantity, \
         consumed = EXCLUDED.consumed, \
         updated_at = EXCLUDED.updated_at",
    )
    .bind(batch.id.as_uuid())
    .bind(batch.item_id.as_uuid())
    .bind(&batch.batch_number)
    .bind(batch.production_date)
    .bind(batch.expiry_date)
    .bind(batch.quantity.as_decimal())
    .bind(batch.unit_cost)
    .bind(batch.consumed)
    .bind(batch.created_at)
    .bind(batch.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub(crate) async fn insert_ledger_entry(
    conn: &mut PgConnection,
    entry: &LedgerEntry,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO stock_ledger (id, tenant_id, inventory_item_id, warehouse_id, product_id, \
         entry_type, quantity, unit_cost, balance_before, balance_after, source_type, source_id, \
         lock_id, occurred_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
    )
    .bind(entry.id.as_uuid())
    .bind(entry.tenant_id.as_uuid())
    .bind(entry.item_id.as_uuid())
    .bind(entry.warehouse_id.as_uuid())
    .bind(entry.product_id.as_uuid())
    .bind(entry.entry_type.as_str())
    .bind(entry.quantity.as_decimal())
    .bind(entry.unit_cost)
    .bind(entry.balance_before.as_decimal())
    .bind(entry.balance_after.as_decimal())
    .bind(entry.source.source_type())
    .bind(entry.source.source_id())
    .bind(entry.lock_id.map(|l| l.as_uuid()))
    .bind(entry.occurred_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub(crate) async fn list_ledger_by_item(
    conn: &mut PgConnection,
    item_id: ItemId,
) -> Result<Vec<LedgerEntry>> {
    let rows = sqlx::query(&format!(
        "SELECT {LEDGER_COLUMNS} FROM stock_ledger \
         WHERE inventory_item_id = $1 ORDER BY occurred_at"
    ))
    .bind(item_id.as_uuid())
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter().map(row_to_entry).collect()
}

pub(crate) async fn list_ledger_by_source(
    conn: &mut PgConnection,
    source_type: &str,
    source_id: &str,
) -> Result<Vec<LedgerEntry>> {
    let rows = sqlx::query(&format!(
        "SELECT {LEDGER_COLUMNS} FROM stock_ledger \
         WHERE source_type = $1 AND source_id = $2 ORDER BY occurred_at"
    ))
    .bind(source_type)
    .bind(source_id)
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter().map(row_to_entry).collect()
}

/// PostgreSQL-backed inventory item store.
///
/// Each call runs on its own pooled connection and commits immediately.
/// Use [`crate::TransactionScope`] when an item write must be atomic with
/// lock or ledger writes.
#[derive(Clone)]
pub struct PostgresItemStore {
    pool: PgPool,
}

impl PostgresItemStore {
    /// Creates a new PostgreSQL item store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl InventoryItemStore for PostgresItemStore {
    async fn find_by_id(&self, id: ItemId) -> Result<InventoryItem> {
        let mut conn = self.pool.acquire().await?;
        fetch_item(&mut conn, id).await
    }

    async fn find_by_warehouse_and_product(
        &self,
        tenant_id: TenantId,
        warehouse_id: WarehouseId,
        product_id: ProductId,
    ) -> Result<InventoryItem> {
        let mut conn = self.pool.acquire().await?;
        fetch_item_by_key(&mut conn, tenant_id, warehouse_id, product_id).await
    }

    #[tracing::instrument(skip(self))]
    async fn get_or_create(
        &self,
        tenant_id: TenantId,
        warehouse_id: WarehouseId,
        product_id: ProductId,
    ) -> Result<InventoryItem> {
        let mut conn = self.pool.acquire().await?;
        get_or_create_item(&mut conn, tenant_id, warehouse_id, product_id).await
    }

    async fn find_by_warehouse(
        &self,
        tenant_id: TenantId,
        warehouse_id: WarehouseId,
    ) -> Result<Vec<InventoryItem>> {
        let mut conn = self.pool.acquire().await?;
        list_items_by_warehouse(&mut conn, tenant_id, warehouse_id).await
    }

    async fn find_below_minimum(&self, tenant_id: TenantId) -> Result<Vec<InventoryItem>> {
        let mut conn = self.pool.acquire().await?;
        list_items_below_minimum(&mut conn, tenant_id).await
    }

    async fn sum_quantity_by_product(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
    ) -> Result<Decimal> {
        let mut conn = self.pool.acquire().await?;
        sum_quantity_by_product(&mut conn, tenant_id, product_id).await
    }

    async fn save(&self, item: &InventoryItem) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        upsert_item(&mut conn, item).await
    }

    #[tracing::instrument(skip(self, item), fields(item_id = %item.id()))]
    async fn save_with_lock(&self, item: &InventoryItem) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        update_item_guarded(&mut conn, item).await
    }
}

/// PostgreSQL-backed stock lock store.
#[derive(Clone)]
pub struct PostgresLockStore {
    pool: PgPool,
}

impl PostgresLockStore {
    /// Creates a new PostgreSQL lock store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StockLockStore for PostgresLockStore {
    async fn find_by_id(&self, id: LockId) -> Result<StockLock> {
        let mut conn = self.pool.acquire().await?;
        fetch_lock(&mut conn, id).await
    }

    async fn find_by_item(&self, item_id: ItemId) -> Result<Vec<StockLock>> {
        let mut conn = self.pool.acquire().await?;
        list_locks_by_item(&mut conn, item_id).await
    }

    async fn find_active(&self, item_id: ItemId) -> Result<Vec<StockLock>> {
        let mut conn = self.pool.acquire().await?;
        list_active_locks(&mut conn, item_id).await
    }

    async fn find_expired(&self, now: DateTime<Utc>) -> Result<Vec<StockLock>> {
        let mut conn = self.pool.acquire().await?;
        list_expired_locks(&mut conn, now).await
    }

    async fn find_by_source(&self, source_type: &str, source_id: &str) -> Result<Vec<StockLock>> {
        let mut conn = self.pool.acquire().await?;
        list_locks_by_source(&mut conn, source_type, source_id).await
    }

    async fn save(&self, lock: &StockLock) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        upsert_lock(&mut conn, lock).await
    }

    #[tracing::instrument(skip(self))]
    async fn release_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        // The lock flip and the item quantity restore must land together.
        let mut tx = self.pool.begin().await?;
        let released = release_expired_locks(&mut tx, now).await?;
        tx.commit().await?;
        Ok(released)
    }
}

/// PostgreSQL-backed stock batch store.
#[derive(Clone)]
pub struct PostgresBatchStore {
    pool: PgPool,
}

impl PostgresBatchStore {
    /// Creates a new PostgreSQL batch store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StockBatchStore for PostgresBatchStore {
    async fn find_by_id(&self, id: BatchId) -> Result<StockBatch> {
        let mut conn = self.pool.acquire().await?;
        fetch_batch(&mut conn, id).await
    }

    async fn find_by_item(&self, item_id: ItemId) -> Result<Vec<StockBatch>> {
        let mut conn = self.pool.acquire().await?;
        list_batches_by_item(&mut conn, item_id).await
    }

    async fn find_available(&self, item_id: ItemId, on: NaiveDate) -> Result<Vec<StockBatch>> {
        let mut conn = self.pool.acquire().await?;
        list_available_batches(&mut conn, item_id, on).await
    }

    async fn find_by_batch_number(
        &self,
        item_id: ItemId,
        batch_number: &str,
    ) -> Result<Vec<StockBatch>> {
        let mut conn = self.pool.acquire().await?;
        list_batches_by_number(&mut conn, item_id, batch_number).await
    }

    async fn save(&self, batch: &StockBatch) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        upsert_batch(&mut conn, batch).await
    }
}

/// PostgreSQL-backed ledger store.
#[derive(Clone)]
pub struct PostgresLedgerStore {
    pool: PgPool,
}

impl PostgresLedgerStore {
    /// Creates a new PostgreSQL ledger store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LedgerStore for PostgresLedgerStore {
    async fn append(&self, entry: &LedgerEntry) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        insert_ledger_entry(&mut conn, entry).await
    }

    async fn find_by_item(&self, item_id: ItemId) -> Result<Vec<LedgerEntry>> {
        let mut conn = self.pool.acquire().await?;
        list_ledger_by_item(&mut conn, item_id).await
    }

    async fn find_by_source(
        &self,
        source_type: &str,
        source_id: &str,
    ) -> Result<Vec<LedgerEntry>> {
        let mut conn = self.pool.acquire().await?;
        list_ledger_by_source(&mut conn, source_type, source_id).await
    }
}
