//! Domain layer for the inventory stock-reservation engine.
//!
//! This crate provides the core domain model:
//! - [`InventoryItem`], the aggregate root tracking available vs. locked
//!   stock for one (tenant, warehouse, product) triple
//! - [`StockLock`], a reservation with a tagged lifecycle state
//! - [`StockBatch`], a received lot tracked for traceability and expiry
//! - [`LedgerEntry`], the append-only audit record for stock movements
//! - [`Version`], the counter backing optimistic concurrency control

pub mod batch;
pub mod error;
pub mod ids;
pub mod item;
pub mod ledger;
pub mod lock;
pub mod version;

pub use batch::{BatchInfo, StockBatch};
pub use error::InventoryError;
pub use ids::{BatchId, EntryId, ItemId, LockId};
pub use item::{InventoryItem, ItemRecord};
pub use ledger::{LedgerEntry, LedgerEntryType};
pub use lock::{LockRecord, LockState, SourceRef, StockLock};
pub use version::Version;
