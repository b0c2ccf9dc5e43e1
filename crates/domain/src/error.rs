//! Domain error types.

use common::{Quantity, QuantityError};
use thiserror::Error;

use crate::ids::LockId;
use crate::lock::LockState;

/// Errors that can occur during inventory aggregate operations.
///
/// Every variant is returned before any state mutation: aggregate methods
/// validate fully, then apply, so a failed operation is always a no-op.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InventoryError {
    /// The requested lock or deduction exceeds available quantity.
    /// Recoverable by the caller (partial fulfillment, backorder);
    /// never retried automatically.
    #[error("insufficient available stock: requested {requested}, available {available}")]
    InsufficientStock {
        requested: Quantity,
        available: Quantity,
    },

    /// The lock ID does not exist among the item's loaded locks.
    #[error("stock lock not found: {0}")]
    LockNotFound(LockId),

    /// The lock is already released or consumed. A workflow error,
    /// surfaced to the caller and not retried.
    #[error("stock lock {id} is {state} and cannot transition")]
    InvalidLockState { id: LockId, state: LockState },

    /// Input rejected before any state change: non-positive quantity,
    /// empty source reference, negative cost, missing reason.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A quantity operation failed its non-negativity check.
    #[error(transparent)]
    Quantity(#[from] QuantityError),
}
