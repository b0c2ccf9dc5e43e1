//! Transaction scope: item, lock and ledger writes that commit together.
//!
//! A reservation touches three tables: the item's quantities move, a lock
//! row is written, and a ledger entry is appended. [`TransactionScope`]
//! runs a closure against transaction-bound store handles and commits only
//! if the closure returns `Ok`; any error rolls the whole batch back.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use common::{ProductId, TenantId, WarehouseId};
use domain::{BatchId, InventoryItem, ItemId, LedgerEntry, LockId, StockBatch, StockLock};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use tokio::sync::Mutex;

use crate::error::{Result, StoreError};
use crate::postgres;
use crate::store::{InventoryItemStore, LedgerStore, StockBatchStore, StockLockStore};

type SharedTx = Arc<Mutex<Transaction<'static, Postgres>>>;

/// Runs store operations inside one database transaction.
#[derive(Clone)]
pub struct TransactionScope {
    pool: PgPool,
}

impl TransactionScope {
    /// Creates a transaction scope over the pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Begins a transaction, hands transaction-bound stores to `f`, and
    /// commits when `f` returns `Ok` or rolls back when it returns `Err`.
    ///
    /// The store handles in [`TxStores`] must not outlive the closure. If a
    /// handle is moved out (into a spawned task, for instance), the scope
    /// cannot reclaim the transaction: it rolls back on drop and `execute`
    /// fails with [`StoreError::TransactionStillInUse`].
    ///
    /// A [`StoreError::ConcurrencyConflict`] surfacing from
    /// `save_with_lock` rolls back like any other error; the caller retries
    /// the whole scope against freshly loaded state.
    pub async fn execute<T, F, Fut>(&self, f: F) -> Result<T>
    where
        F: FnOnce(TxStores) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let tx = self.pool.begin().await?;
        let shared: SharedTx = Arc::new(Mutex::new(tx));

        let result = f(TxStores::new(Arc::clone(&shared))).await;

        let tx = match Arc::try_unwrap(shared) {
            Ok(mutex) => mutex.into_inner(),
            Err(_) => {
                // A leaked handle still owns the transaction; it rolls back
                // when the last handle drops.
                return Err(match result {
                    Err(e) => e,
                    Ok(_) => StoreError::TransactionStillInUse,
                });
            }
        };

        match result {
            Ok(value) => {
                tx.commit().await?;
                Ok(value)
            }
            Err(e) => {
                tx.rollback().await?;
                Err(e)
            }
        }
    }
}

/// The stores bound to one open transaction.
pub struct TxStores {
    pub items: TxInventoryItemStore,
    pub locks: TxStockLockStore,
    pub batches: TxStockBatchStore,
    pub ledger: TxLedgerStore,
}

impl TxStores {
    fn new(tx: SharedTx) -> Self {
        Self {
            items: TxInventoryItemStore {
                tx: Arc::clone(&tx),
            },
            locks: TxStockLockStore {
                tx: Arc::clone(&tx),
            },
            batches: TxStockBatchStore {
                tx: Arc::clone(&tx),
            },
            ledger: TxLedgerStore { tx },
        }
    }
}

/// [`InventoryItemStore`] bound to an open transaction.
pub struct TxInventoryItemStore {
    tx: SharedTx,
}

/// [`StockLockStore`] bound to an open transaction.
pub struct TxStockLockStore {
    tx: SharedTx,
}

/// [`StockBatchStore`] bound to an open transaction.
pub struct TxStockBatchStore {
    tx: SharedTx,
}

/// [`LedgerStore`] bound to an open transaction.
pub struct TxLedgerStore {
    tx: SharedTx,
}

#[async_trait]
impl InventoryItemStore for TxInventoryItemStore {
    async fn find_by_id(&self, id: ItemId) -> Result<InventoryItem> {
        let mut tx = self.tx.lock().await;
        postgres::fetch_item(&mut tx, id).await
    }

    async fn find_by_warehouse_and_product(
        &self,
        tenant_id: TenantId,
        warehouse_id: WarehouseId,
        product_id: ProductId,
    ) -> Result<InventoryItem> {
        let mut tx = self.tx.lock().await;
        postgres::fetch_item_by_key(&mut tx, tenant_id, warehouse_id, product_id).await
    }

    async fn get_or_create(
        &self,
        tenant_id: TenantId,
        warehouse_id: WarehouseId,
        product_id: ProductId,
    ) -> Result<InventoryItem> {
        let mut tx = self.tx.lock().await;
        postgres::get_or_create_item(&mut tx, tenant_id, warehouse_id, product_id).await
    }

    async fn find_by_warehouse(
        &self,
        tenant_id: TenantId,
        warehouse_id: WarehouseId,
    ) -> Result<Vec<InventoryItem>> {
        let mut tx = self.tx.lock().await;
        postgres::list_items_by_warehouse(&mut tx, tenant_id, warehouse_id).await
    }

    async fn find_below_minimum(&self, tenant_id: TenantId) -> Result<Vec<InventoryItem>> {
        let mut tx = self.tx.lock().await;
        postgres::list_items_below_minimum(&mut tx, tenant_id).await
    }

    async fn sum_quantity_by_product(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
    ) -> Result<Decimal> {
        let mut tx = self.tx.lock().await;
        postgres::sum_quantity_by_product(&mut tx, tenant_id, product_id).await
    }

    async fn save(&self, item: &InventoryItem) -> Result<()> {
        let mut tx = self.tx.lock().await;
        postgres::upsert_item(&mut tx, item).await
    }

    async fn save_with_lock(&self, item: &InventoryItem) -> Result<()> {
        let mut tx = self.tx.lock().await;
        postgres::update_item_guarded(&mut tx, item).await
    }
}

#[async_trait]
impl StockLockStore for TxStockLockStore {
    async fn find_by_id(&self, id: LockId) -> Result<StockLock> {
        let mut tx = self.tx.lock().await;
        postgres::fetch_lock(&mut tx, id).await
    }

    async fn find_by_item(&self, item_id: ItemId) -> Result<Vec<StockLock>> {
        let mut tx = self.tx.lock().await;
        postgres::list_locks_by_item(&mut tx, item_id).await
    }

    async fn find_active(&self, item_id: ItemId) -> Result<Vec<StockLock>> {
        let mut tx = self.tx.lock().await;
        postgres::list_active_locks(&mut tx, item_id).await
    }

    async fn find_expired(&self, now: DateTime<Utc>) -> Result<Vec<StockLock>> {
        let mut tx = self.tx.lock().await;
        postgres::list_expired_locks(&mut tx, now).await
    }

    async fn find_by_source(&self, source_type: &str, source_id: &str) -> Result<Vec<StockLock>> {
        let mut tx = self.tx.lock().await;
        postgres::list_locks_by_source(&mut tx, source_type, source_id).await
    }

    async fn save(&self, lock: &StockLock) -> Result<()> {
        let mut tx = self.tx.lock().await;
        postgres::upsert_lock(&mut tx, lock).await
    }

    async fn release_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut tx = self.tx.lock().await;
        postgres::release_expired_locks(&mut tx, now).await
    }
}

#[async_trait]
impl StockBatchStore for TxStockBatchStore {
    async fn find_by_id(&self, id: BatchId) -> Result<StockBatch> {
        let mut tx = self.tx.lock().await;
        postgres::fetch_batch(&mut tx, id).await
    }

    async fn find_by_item(&self, item_id: ItemId) -> Result<Vec<StockBatch>> {
        let mut tx = self.tx.lock().await;
        postgres::list_batches_by_item(&mut tx, item_id).await
    }

    async fn find_available(&self, item_id: ItemId, on: NaiveDate) -> Result<Vec<StockBatch>> {
        let mut tx = self.tx.lock().await;
        postgres::list_available_batches(&mut tx, item_id, on).await
    }

    async fn find_by_batch_number(
        &self,
        item_id: ItemId,
        batch_number: &str,
    ) -> Result<Vec<StockBatch>> {
        let mut tx = self.tx.lock().await;
        postgres::list_batches_by_number(&mut tx, item_id, batch_number).await
    }

    async fn save(&self, batch: &StockBatch) -> Result<()> {
        let mut tx = self.tx.lock().await;
        postgres::upsert_batch(&mut tx, batch).await
    }
}

#[async_trait]
impl LedgerStore for TxLedgerStore {
    async fn append(&self, entry: &LedgerEntry) -> Result<()> {
        let mut tx = self.tx.lock().await;
        postgres::insert_ledger_entry(&mut tx, entry).await
    }

    async fn find_by_item(&self, item_id: ItemId) -> Result<Vec<LedgerEntry>> {
        let mut tx = self.tx.lock().await;
        postgres::list_ledger_by_item(&mut tx, item_id).await
    }

    async fn find_by_source(
        &self,
        source_type: &str,
        source_id: &str,
    ) -> Result<Vec<LedgerEntry>> {
        let mut tx = self.tx.lock().await;
        postgres::list_ledger_by_source(&mut tx, source_type, source_id).await
    }
}
