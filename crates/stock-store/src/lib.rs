//! Persistence for the inventory stock-reservation engine.
//!
//! Four store traits cover the persistence surface:
//! - [`InventoryItemStore`] for the aggregate, with conditional updates
//!   backing optimistic concurrency control
//! - [`StockLockStore`] for reservation rows and the expiration sweep
//! - [`StockBatchStore`] for received-lot traceability
//! - [`LedgerStore`] for the append-only movement ledger
//!
//! Each trait has a PostgreSQL implementation and an in-memory one with
//! the same concurrency semantics. [`TransactionScope`] binds the
//! PostgreSQL stores to one transaction so a reservation's item, lock,
//! batch and ledger writes commit or roll back together.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod scope;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::{
    InMemoryBatchStore, InMemoryItemStore, InMemoryLedgerStore, InMemoryLockStore, InMemoryStores,
};
pub use postgres::{
    PostgresBatchStore, PostgresItemStore, PostgresLedgerStore, PostgresLockStore, run_migrations,
};
pub use scope::{TransactionScope, TxStores};
pub use store::{InventoryItemStore, LedgerStore, StockBatchStore, StockLockStore};
