//! Store traits for inventory persistence.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use common::{ProductId, TenantId, WarehouseId};
use domain::{BatchId, InventoryItem, ItemId, LedgerEntry, LockId, StockBatch, StockLock};
use rust_decimal::Decimal;

use crate::Result;

/// Persistence for the [`InventoryItem`] aggregate.
///
/// All implementations must be thread-safe (Send + Sync). Writers on the
/// contended paths use [`save_with_lock`](Self::save_with_lock); correctness
/// under concurrency rests entirely on its conditional update and on the
/// unique (tenant, warehouse, product) key behind
/// [`get_or_create`](Self::get_or_create) — no in-process locking is
/// involved. Cancellation is cooperative: dropping a call's future inside a
/// transaction rolls the transaction back.
#[async_trait]
pub trait InventoryItemStore: Send + Sync {
    /// Finds an item by its ID. Locks are not preloaded.
    async fn find_by_id(&self, id: ItemId) -> Result<InventoryItem>;

    /// Finds the item for a (tenant, warehouse, product) triple.
    async fn find_by_warehouse_and_product(
        &self,
        tenant_id: TenantId,
        warehouse_id: WarehouseId,
        product_id: ProductId,
    ) -> Result<InventoryItem>;

    /// Returns the item for the triple, creating a zero-quantity item if
    /// none exists yet.
    ///
    /// Creation is a single conditional insert backed by the unique key,
    /// never a check-then-insert: any number of concurrent callers end up
    /// with exactly one row, and the losers of the race re-read and return
    /// the winner's row.
    async fn get_or_create(
        &self,
        tenant_id: TenantId,
        warehouse_id: WarehouseId,
        product_id: ProductId,
    ) -> Result<InventoryItem>;

    /// Lists all items in a warehouse. A reporting read, outside the
    /// hard-invariant surface.
    async fn find_by_warehouse(
        &self,
        tenant_id: TenantId,
        warehouse_id: WarehouseId,
    ) -> Result<Vec<InventoryItem>>;

    /// Lists items whose on-hand total fell below their minimum threshold.
    async fn find_below_minimum(&self, tenant_id: TenantId) -> Result<Vec<InventoryItem>>;

    /// Sums the on-hand total for a product across all warehouses.
    async fn sum_quantity_by_product(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
    ) -> Result<Decimal>;

    /// Unconditionally upserts the item. No concurrency check — only for
    /// paths where no other writer can race.
    async fn save(&self, item: &InventoryItem) -> Result<()>;

    /// Persists the item with optimistic concurrency control.
    ///
    /// The in-memory item's version already reflects the just-applied
    /// mutation; the store compares the row against `version - 1`. When
    /// zero rows match, the write fails with
    /// [`StoreError::ConcurrencyConflict`](crate::StoreError::ConcurrencyConflict)
    /// and nothing is written. Exactly one of any number of writers racing
    /// on the same base version succeeds.
    async fn save_with_lock(&self, item: &InventoryItem) -> Result<()>;
}

/// Persistence and query surface for stock locks.
///
/// Lock state transitions originate in the aggregate
/// ([`InventoryItem::lock_stock`]/[`unlock_stock`](InventoryItem::unlock_stock)/
/// [`deduct_stock`](InventoryItem::deduct_stock)); this store persists the
/// results and serves the cross-aggregate reads the sweep and the
/// fulfillment workflows need.
#[async_trait]
pub trait StockLockStore: Send + Sync {
    /// Finds a lock by its ID.
    async fn find_by_id(&self, id: LockId) -> Result<StockLock>;

    /// Lists all locks referencing an item, terminal ones included.
    async fn find_by_item(&self, item_id: ItemId) -> Result<Vec<StockLock>>;

    /// Lists the locks still holding quantity against an item.
    async fn find_active(&self, item_id: ItemId) -> Result<Vec<StockLock>>;

    /// Lists active locks whose expiry lies before `now`, across all items.
    async fn find_expired(&self, now: DateTime<Utc>) -> Result<Vec<StockLock>>;

    /// Lists locks requested by a source document.
    async fn find_by_source(&self, source_type: &str, source_id: &str) -> Result<Vec<StockLock>>;

    /// Upserts one lock row.
    async fn save(&self, lock: &StockLock) -> Result<()>;

    /// Batch sweep: releases every expired active lock across all items and
    /// returns the reserved quantity to each owning item's available stock,
    /// atomically. Returns the number of locks released.
    ///
    /// This is the persistence-level counterpart to
    /// [`InventoryItem::release_expired_locks_at`] — the periodic sweep job
    /// calls it directly instead of loading every aggregate. Each affected
    /// item's version advances once per released lock, so a concurrent
    /// writer's conditional update will observe the sweep as a conflict.
    ///
    /// The sweep serializes with writers on the item row. For that to hold,
    /// a writer releasing or consuming a lock must pair its item write and
    /// lock write in one transaction (via
    /// [`TransactionScope`](crate::TransactionScope)); split across
    /// autocommitted statements, the sweep can observe the item updated but
    /// the lock still active and restore the same quantity twice.
    async fn release_expired(&self, now: DateTime<Utc>) -> Result<u64>;
}

/// Persistence and traceability queries for received stock batches.
///
/// Batches are recorded at receiving time
/// ([`InventoryItem::increase_stock_batched`]) and queried for lot
/// traceability and expiry reporting. They carry no hard invariants of
/// their own; the item's quantities stay authoritative.
#[async_trait]
pub trait StockBatchStore: Send + Sync {
    /// Finds a batch by its ID.
    async fn find_by_id(&self, id: BatchId) -> Result<StockBatch>;

    /// Lists all batches received for an item, oldest first.
    async fn find_by_item(&self, item_id: ItemId) -> Result<Vec<StockBatch>>;

    /// Lists batches still holding usable stock on `on`: not consumed and
    /// not past their expiry date. Ordered soonest-expiring first so
    /// callers can allocate first-expired-first-out.
    async fn find_available(&self, item_id: ItemId, on: NaiveDate) -> Result<Vec<StockBatch>>;

    /// Lists an item's batches carrying a batch number.
    async fn find_by_batch_number(
        &self,
        item_id: ItemId,
        batch_number: &str,
    ) -> Result<Vec<StockBatch>>;

    /// Upserts one batch row.
    async fn save(&self, batch: &StockBatch) -> Result<()>;
}

/// Append-only persistence for the stock movement ledger.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Appends one ledger entry. Entries are never updated or deleted.
    async fn append(&self, entry: &LedgerEntry) -> Result<()>;

    /// Lists entries for an item, oldest first.
    async fn find_by_item(&self, item_id: ItemId) -> Result<Vec<LedgerEntry>>;

    /// Lists entries recorded for a source document, oldest first.
    async fn find_by_source(&self, source_type: &str, source_id: &str)
    -> Result<Vec<LedgerEntry>>;
}
