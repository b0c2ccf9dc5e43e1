//! In-memory store implementations for tests and local development.
//!
//! All three stores share one [`MemoryDb`] behind an async `RwLock`, so the
//! optimistic-concurrency and creation-race semantics match the PostgreSQL
//! implementations observably: a stale writer gets a conflict, and racing
//! creators converge on one item.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use common::{ProductId, TenantId, WarehouseId};
use domain::{
    BatchId, InventoryError, InventoryItem, ItemId, ItemRecord, LedgerEntry, LockId, StockBatch,
    StockLock,
};
use rust_decimal::Decimal;
use tokio::sync::RwLock;

use crate::error::{Result, StoreError};
use crate::store::{InventoryItemStore, LedgerStore, StockBatchStore, StockLockStore};

#[derive(Default)]
struct MemoryDb {
    items: HashMap<ItemId, ItemRecord>,
    key_index: HashMap<(TenantId, WarehouseId, ProductId), ItemId>,
    locks: HashMap<LockId, StockLock>,
    batches: HashMap<BatchId, StockBatch>,
    ledger: Vec<LedgerEntry>,
}

/// Shared in-memory database with a store handle per trait.
#[derive(Clone, Default)]
pub struct InMemoryStores {
    db: Arc<RwLock<MemoryDb>>,
}

impl InMemoryStores {
    /// Creates an empty in-memory database.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns an item store handle over the shared database.
    pub fn items(&self) -> InMemoryItemStore {
        InMemoryItemStore {
            db: Arc::clone(&self.db),
        }
    }

    /// Returns a lock store handle over the shared database.
    pub fn locks(&self) -> InMemoryLockStore {
        InMemoryLockStore {
            db: Arc::clone(&self.db),
        }
    }

    /// Returns a batch store handle over the shared database.
    pub fn batches(&self) -> InMemoryBatchStore {
        InMemoryBatchStore {
            db: Arc::clone(&self.db),
        }
    }

    /// Returns a ledger store handle over the shared database.
    pub fn ledger(&self) -> InMemoryLedgerStore {
        InMemoryLedgerStore {
            db: Arc::clone(&self.db),
        }
    }
}

/// In-memory [`InventoryItemStore`].
#[derive(Clone)]
pub struct InMemoryItemStore {
    db: Arc<RwLock<MemoryDb>>,
}

/// In-memory [`StockLockStore`].
#[derive(Clone)]
pub struct InMemoryLockStore {
    db: Arc<RwLock<MemoryDb>>,
}

/// In-memory [`StockBatchStore`].
#[derive(Clone)]
pub struct InMemoryBatchStore {
    db: Arc<RwLock<MemoryDb>>,
}

/// In-memory [`LedgerStore`].
#[derive(Clone)]
pub struct InMemoryLedgerStore {
    db: Arc<RwLock<MemoryDb>>,
}

#[async_trait]
impl InventoryItemStore for InMemoryItemStore {
    async fn find_by_id(&self, id: ItemId) -> Result<InventoryItem> {
        let db = self.db.read().await;
        db.items
            .get(&id)
            .cloned()
            .map(InventoryItem::from_record)
            .ok_or(StoreError::ItemNotFound(id))
    }

    async fn find_by_warehouse_and_product(
        &self,
        tenant_id: TenantId,
        warehouse_id: WarehouseId,
        product_id: ProductId,
    ) -> Result<InventoryItem> {
        let db = self.db.read().await;
        db.key_index
            .get(&(tenant_id, warehouse_id, product_id))
            .and_then(|id| db.items.get(id))
            .cloned()
            .map(InventoryItem::from_record)
            .ok_or(StoreError::ItemKeyNotFound {
                tenant_id,
                warehouse_id,
                product_id,
            })
    }

    async fn get_or_create(
        &self,
        tenant_id: TenantId,
        warehouse_id: WarehouseId,
        product_id: ProductId,
    ) -> Result<InventoryItem> {
        // One write lock covers lookup and insert, so concurrent creators
        // serialize and all but the first observe the winner's item.
        let mut db = self.db.write().await;
        if let Some(record) = db
            .key_index
            .get(&(tenant_id, warehouse_id, product_id))
            .and_then(|id| db.items.get(id))
        {
            return Ok(InventoryItem::from_record(record.clone()));
        }
        let item = InventoryItem::new(tenant_id, warehouse_id, product_id);
        db.key_index
            .insert((tenant_id, warehouse_id, product_id), item.id());
        db.items.insert(item.id(), item.to_record());
        Ok(item)
    }

    async fn find_by_warehouse(
        &self,
        tenant_id: TenantId,
        warehouse_id: WarehouseId,
    ) -> Result<Vec<InventoryItem>> {
        let db = self.db.read().await;
        let mut records: Vec<ItemRecord> = db
            .items
            .values()
            .filter(|r| r.tenant_id == tenant_id && r.warehouse_id == warehouse_id)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.created_at);
        Ok(records.into_iter().map(InventoryItem::from_record).collect())
    }

    async fn find_below_minimum(&self, tenant_id: TenantId) -> Result<Vec<InventoryItem>> {
        let db = self.db.read().await;
        let mut records: Vec<ItemRecord> = db
            .items
            .values()
            .filter(|r| {
                r.tenant_id == tenant_id
                    && r.min_quantity.is_positive()
                    && r.available.add(r.locked).as_decimal() < r.min_quantity.as_decimal()
            })
            .cloned()
            .collect();
        records.sort_by_key(|r| r.created_at);
        Ok(records.into_iter().map(InventoryItem::from_record).collect())
    }

    async fn sum_quantity_by_product(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
    ) -> Result<Decimal> {
        let db = self.db.read().await;
        Ok(db
            .items
            .values()
            .filter(|r| r.tenant_id == tenant_id && r.product_id == product_id)
            .map(|r| r.available.as_decimal() + r.locked.as_decimal())
            .sum())
    }

    async fn save(&self, item: &InventoryItem) -> Result<()> {
        let mut db = self.db.write().await;
        let record = item.to_record();
        db.key_index.insert(
            (record.tenant_id, record.warehouse_id, record.product_id),
            record.id,
        );
        db.items.insert(record.id, record);
        Ok(())
    }

    async fn save_with_lock(&self, item: &InventoryItem) -> Result<()> {
        let mut db = self.db.write().await;
        let base_version = item.version().prev();
        let current = db.items.get(&item.id());
        match current {
            Some(stored) if stored.version == base_version => {
                db.items.insert(item.id(), item.to_record());
                Ok(())
            }
            // Missing row and stale version both mean zero rows would match
            // the conditional update.
            _ => Err(StoreError::ConcurrencyConflict {
                item_id: item.id(),
                base_version,
            }),
        }
    }
}

#[async_trait]
impl StockLockStore for InMemoryLockStore {
    async fn find_by_id(&self, id: LockId) -> Result<StockLock> {
        let db = self.db.read().await;
        db.locks
            .get(&id)
            .cloned()
            .ok_or(StoreError::LockNotFound(id))
    }

    async fn find_by_item(&self, item_id: ItemId) -> Result<Vec<StockLock>> {
        let db = self.db.read().await;
        let mut locks: Vec<StockLock> = db
            .locks
            .values()
            .filter(|l| l.item_id() == item_id)
            .cloned()
            .collect();
        locks.sort_by_key(|l| l.created_at());
        Ok(locks)
    }

    async fn find_active(&self, item_id: ItemId) -> Result<Vec<StockLock>> {
        let db = self.db.read().await;
        let mut locks: Vec<StockLock> = db
            .locks
            .values()
            .filter(|l| l.item_id() == item_id && l.is_active())
            .cloned()
            .collect();
        locks.sort_by_key(|l| l.created_at());
        Ok(locks)
    }

    async fn find_expired(&self, now: DateTime<Utc>) -> Result<Vec<StockLock>> {
        let db = self.db.read().await;
        let mut locks: Vec<StockLock> = db
            .locks
            .values()
            .filter(|l| l.is_expired_at(now))
            .cloned()
            .collect();
        locks.sort_by_key(|l| l.expire_at());
        Ok(locks)
    }

    async fn find_by_source(&self, source_type: &str, source_id: &str) -> Result<Vec<StockLock>> {
        let db = self.db.read().await;
        let mut locks: Vec<StockLock> = db
            .locks
            .values()
            .filter(|l| {
                l.source().source_type() == source_type && l.source().source_id() == source_id
            })
            .cloned()
            .collect();
        locks.sort_by_key(|l| l.created_at());
        Ok(locks)
    }

    async fn save(&self, lock: &StockLock) -> Result<()> {
        let mut db = self.db.write().await;
        db.locks.insert(lock.id(), lock.clone());
        Ok(())
    }

    async fn release_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut db = self.db.write().await;

        let mut per_item: HashMap<ItemId, (Decimal, i64)> = HashMap::new();
        let mut released = 0u64;
        for lock in db.locks.values_mut() {
            if !lock.is_expired_at(now) {
                continue;
            }
            let mut record = lock.to_record();
            record.released = true;
            record.released_at = Some(now);
            let entry = per_item.entry(record.item_id).or_insert((Decimal::ZERO, 0));
            entry.0 += record.quantity.as_decimal();
            entry.1 += 1;
            *lock = StockLock::from_record(record);
            released += 1;
        }

        for (item_id, (quantity, lock_count)) in per_item {
            let Some(record) = db.items.get_mut(&item_id) else {
                continue;
            };
            let restored =
                common::Quantity::new(quantity).map_err(InventoryError::from)?;
            record.available = record.available.add(restored);
            record.locked = record
                .locked
                .checked_sub(restored)
                .map_err(InventoryError::from)?;
            record.version = domain::Version::new(record.version.as_i64() + lock_count);
            record.updated_at = now;
        }

        Ok(released)
    }
}

#[async_trait]
impl StockBatchStore for InMemoryBatchStore {
    async fn find_by_id(&self, id: BatchId) -> Result<StockBatch> {
        let db = self.db.read().await;
        db.batches
            .get(&id)
            .cloned()
            .ok_or(StoreError::BatchNotFound(id))
    }

    async fn find_by_item(&self, item_id: ItemId) -> Result<Vec<StockBatch>> {
        let db = self.db.read().await;
        let mut batches: Vec<StockBatch> = db
            .batches
            .values()
            .filter(|b| b.item_id == item_id)
            .cloned()
            .collect();
        batches.sort_by_key(|b| b.created_at);
        Ok(batches)
    }

    async fn find_available(&self, item_id: ItemId, on: NaiveDate) -> Result<Vec<StockBatch>> {
        let db = self.db.read().await;
        let mut batches: Vec<StockBatch> = db
            .batches
            .values()
            .filter(|b| b.item_id == item_id && b.is_available_on(on))
            .cloned()
            .collect();
        // Soonest-expiring first, dateless lots last.
        batches.sort_by_key(|b| (b.expiry_date.is_none(), b.expiry_date, b.created_at));
        Ok(batches)
    }

    async fn find_by_batch_number(
        &self,
        item_id: ItemId,
        batch_number: &str,
    ) -> Result<Vec<StockBatch>> {
        let db = self.db.read().await;
        let mut batches: Vec<StockBatch> = db
            .batches
            .values()
            .filter(|b| b.item_id == item_id && b.batch_number == batch_number)
            .cloned()
            .collect();
        batches.sort_by_key(|b| b.created_at);
        Ok(batches)
    }

    async fn save(&self, batch: &StockBatch) -> Result<()> {
        let mut db = self.db.write().await;
        db.batches.insert(batch.id, batch.clone());
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn append(&self, entry: &LedgerEntry) -> Result<()> {
        let mut db = self.db.write().await;
        db.ledger.push(entry.clone());
        Ok(())
    }

    async fn find_by_item(&self, item_id: ItemId) -> Result<Vec<LedgerEntry>> {
        let db = self.db.read().await;
        Ok(db
            .ledger
            .iter()
            .filter(|e| e.item_id == item_id)
            .cloned()
            .collect())
    }

    async fn find_by_source(
        &self,
        source_type: &str,
        source_id: &str,
    ) -> Result<Vec<LedgerEntry>> {
        let db = self.db.read().await;
        Ok(db
            .ledger
            .iter()
            .filter(|e| {
                e.source.source_type() == source_type && e.source.source_id() == source_id
            })
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use common::Quantity;
    use domain::{BatchInfo, LedgerEntryType, SourceRef, Version};
    use rust_decimal_macros::dec;

    async fn seeded_item(stores: &InMemoryStores, quantity: u32) -> InventoryItem {
        let mut item = stores
            .items()
            .get_or_create(TenantId::new(), WarehouseId::new(), ProductId::new())
            .await
            .unwrap();
        item.increase_stock(Quantity::from(quantity), dec!(10))
            .unwrap();
        stores.items().save_with_lock(&item).await.unwrap();
        item
    }

    #[tokio::test]
    async fn get_or_create_returns_same_item_for_same_key() {
        let stores = InMemoryStores::new();
        let tenant = TenantId::new();
        let warehouse = WarehouseId::new();
        let product = ProductId::new();

        let first = stores
            .items()
            .get_or_create(tenant, warehouse, product)
            .await
            .unwrap();
        let second = stores
            .items()
            .get_or_create(tenant, warehouse, product)
            .await
            .unwrap();
        assert_eq!(first.id(), second.id());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn concurrent_get_or_create_converges_on_one_item() {
        let stores = InMemoryStores::new();
        let tenant = TenantId::new();
        let warehouse = WarehouseId::new();
        let product = ProductId::new();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let items = stores.items();
            handles.push(tokio::spawn(async move {
                items.get_or_create(tenant, warehouse, product).await
            }));
        }
        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap().unwrap().id());
        }
        ids.dedup();
        assert_eq!(ids.len(), 1);
    }

    #[tokio::test]
    async fn save_with_lock_rejects_stale_version() {
        let stores = InMemoryStores::new();
        let item = seeded_item(&stores, 100).await;

        // Two writers load the same version and race.
        let mut first = stores.items().find_by_id(item.id()).await.unwrap();
        let mut second = stores.items().find_by_id(item.id()).await.unwrap();
        first.decrease_stock(Quantity::from(10u32)).unwrap();
        second.decrease_stock(Quantity::from(20u32)).unwrap();

        stores.items().save_with_lock(&first).await.unwrap();
        let err = stores.items().save_with_lock(&second).await.unwrap_err();
        assert!(matches!(err, StoreError::ConcurrencyConflict { .. }));

        // The loser reloads and succeeds on the fresh version.
        let mut reloaded = stores.items().find_by_id(item.id()).await.unwrap();
        reloaded.decrease_stock(Quantity::from(20u32)).unwrap();
        stores.items().save_with_lock(&reloaded).await.unwrap();
        let final_item = stores.items().find_by_id(item.id()).await.unwrap();
        assert_eq!(final_item.available().as_decimal(), dec!(70));
    }

    #[tokio::test]
    async fn save_with_lock_rejects_unknown_item() {
        let stores = InMemoryStores::new();
        let item = InventoryItem::new(TenantId::new(), WarehouseId::new(), ProductId::new());
        let err = stores.items().save_with_lock(&item).await.unwrap_err();
        assert!(matches!(err, StoreError::ConcurrencyConflict { .. }));
    }

    #[tokio::test]
    async fn release_expired_restores_quantity_and_advances_version() {
        let stores = InMemoryStores::new();
        let mut item = seeded_item(&stores, 100).await;

        let past = Utc::now() - Duration::minutes(5);
        let future = Utc::now() + Duration::hours(1);
        let expired = item
            .lock_stock(
                Quantity::from(30u32),
                SourceRef::new("order", "O-1").unwrap(),
                past,
            )
            .unwrap();
        stores.items().save_with_lock(&item).await.unwrap();
        let live = item
            .lock_stock(
                Quantity::from(10u32),
                SourceRef::new("order", "O-2").unwrap(),
                future,
            )
            .unwrap();
        stores.items().save_with_lock(&item).await.unwrap();
        stores.locks().save(&expired).await.unwrap();
        stores.locks().save(&live).await.unwrap();
        let version_before = item.version();

        let released = stores.locks().release_expired(Utc::now()).await.unwrap();
        assert_eq!(released, 1);

        let after = stores.items().find_by_id(item.id()).await.unwrap();
        assert_eq!(after.available().as_decimal(), dec!(90));
        assert_eq!(after.locked().as_decimal(), dec!(10));
        assert_eq!(after.version(), Version::new(version_before.as_i64() + 1));

        let swept = stores.locks().find_by_id(expired.id()).await.unwrap();
        assert!(!swept.is_active());
        assert!(stores.locks().find_by_id(live.id()).await.unwrap().is_active());

        // Nothing left to sweep.
        assert_eq!(stores.locks().release_expired(Utc::now()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn find_active_excludes_terminal_locks() {
        let stores = InMemoryStores::new();
        let mut item = seeded_item(&stores, 100).await;
        let future = Utc::now() + Duration::hours(1);

        let kept = item
            .lock_stock(
                Quantity::from(5u32),
                SourceRef::new("order", "O-1").unwrap(),
                future,
            )
            .unwrap();
        let cancelled = item
            .lock_stock(
                Quantity::from(5u32),
                SourceRef::new("order", "O-2").unwrap(),
                future,
            )
            .unwrap();
        stores.locks().save(&kept).await.unwrap();
        stores.locks().save(&cancelled).await.unwrap();

        item.unlock_stock(cancelled.id()).unwrap();
        let released = item.lock(cancelled.id()).unwrap().clone();
        stores.locks().save(&released).await.unwrap();

        let active = stores.locks().find_active(item.id()).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id(), kept.id());

        let all = stores.locks().find_by_item(item.id()).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn available_batches_exclude_expired_and_consumed_lots() {
        let stores = InMemoryStores::new();
        let mut item = stores
            .items()
            .get_or_create(TenantId::new(), WarehouseId::new(), ProductId::new())
            .await
            .unwrap();
        let today = Utc::now().date_naive();

        let stale = item
            .increase_stock_batched(
                Quantity::from(5u32),
                dec!(10),
                BatchInfo::new("LOT-0", None, Some(today - Duration::days(1))).unwrap(),
            )
            .unwrap();
        stores.items().save_with_lock(&item).await.unwrap();
        let later = item
            .increase_stock_batched(
                Quantity::from(10u32),
                dec!(10),
                BatchInfo::new("LOT-2", None, Some(today + Duration::days(30))).unwrap(),
            )
            .unwrap();
        stores.items().save_with_lock(&item).await.unwrap();
        let soon = item
            .increase_stock_batched(
                Quantity::from(10u32),
                dec!(10),
                BatchInfo::new("LOT-1", None, Some(today + Duration::days(3))).unwrap(),
            )
            .unwrap();
        stores.items().save_with_lock(&item).await.unwrap();
        for batch in [&stale, &later, &soon] {
            stores.batches().save(batch).await.unwrap();
        }

        // Soonest-expiring first, the stale lot excluded.
        let available = stores.batches().find_available(item.id(), today).await.unwrap();
        assert_eq!(available.len(), 2);
        assert_eq!(available[0].id, soon.id);
        assert_eq!(available[1].id, later.id);

        let mut consumed = soon.clone();
        consumed.consumed = true;
        stores.batches().save(&consumed).await.unwrap();
        let available = stores.batches().find_available(item.id(), today).await.unwrap();
        assert_eq!(available.len(), 1);
        assert_eq!(available[0].id, later.id);

        let by_number = stores
            .batches()
            .find_by_batch_number(item.id(), "LOT-2")
            .await
            .unwrap();
        assert_eq!(by_number.len(), 1);
        assert_eq!(by_number[0].id, later.id);
        assert_eq!(stores.batches().find_by_item(item.id()).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn ledger_find_by_source() {
        let stores = InMemoryStores::new();
        let item = seeded_item(&stores, 100).await;

        let entry = LedgerEntry::new(
            item.tenant_id(),
            item.id(),
            item.warehouse_id(),
            item.product_id(),
            LedgerEntryType::Lock,
            Quantity::from(5u32),
            dec!(10),
            Quantity::from(100u32),
            Quantity::from(95u32),
            SourceRef::new("order", "O-9").unwrap(),
        )
        .unwrap();
        stores.ledger().append(&entry).await.unwrap();

        let by_source = stores.ledger().find_by_source("order", "O-9").await.unwrap();
        assert_eq!(by_source.len(), 1);
        assert_eq!(by_source[0].id, entry.id);

        assert!(stores
            .ledger()
            .find_by_source("order", "O-404")
            .await
            .unwrap()
            .is_empty());
        assert_eq!(stores.ledger().find_by_item(item.id()).await.unwrap().len(), 1);
    }
}
