//! Shared value types for the inventory stock-reservation engine.
//!
//! This crate is the leaf of the workspace: the non-negative [`Quantity`]
//! decimal and the typed identifiers for the owning key triple that every
//! other crate builds on.

pub mod quantity;
pub mod types;

pub use quantity::{Quantity, QuantityError};
pub use types::{ProductId, TenantId, WarehouseId};
