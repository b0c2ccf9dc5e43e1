//! Store error types.

use common::{ProductId, TenantId, WarehouseId};
use domain::{BatchId, InventoryError, ItemId, LockId, Version};
use thiserror::Error;

/// Errors that can occur when interacting with the stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The conditional update matched zero rows: another writer advanced
    /// the item past the base version this writer read. The caller must
    /// reload the item and retry the whole operation; the store never
    /// retries internally.
    #[error(
        "concurrency conflict for inventory item {item_id}: base version {base_version} is no longer current"
    )]
    ConcurrencyConflict {
        item_id: ItemId,
        base_version: Version,
    },

    /// No inventory item with this ID.
    #[error("inventory item not found: {0}")]
    ItemNotFound(ItemId),

    /// No inventory item for this (tenant, warehouse, product) triple.
    #[error("no inventory for tenant {tenant_id}, warehouse {warehouse_id}, product {product_id}")]
    ItemKeyNotFound {
        tenant_id: TenantId,
        warehouse_id: WarehouseId,
        product_id: ProductId,
    },

    /// No stock lock with this ID.
    #[error("stock lock not found: {0}")]
    LockNotFound(LockId),

    /// No stock batch with this ID.
    #[error("stock batch not found: {0}")]
    BatchNotFound(BatchId),

    /// A domain rule rejected the operation (also raised when a persisted
    /// row fails domain validation on load).
    #[error(transparent)]
    Domain(#[from] InventoryError),

    /// A database error occurred.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A transaction-scoped store was still held when the scope closed.
    #[error("transaction handle was still in use when the scope closed")]
    TransactionStillInUse,
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
