//! Stock lock: a reservation of quantity against one inventory item.

use chrono::{DateTime, Utc};
use common::Quantity;
use serde::{Deserialize, Serialize};

use crate::error::InventoryError;
use crate::ids::{ItemId, LockId};

/// Reference to the source document that requested a reservation,
/// e.g. `("order", "O-123")`. Both parts must be non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceRef {
    source_type: String,
    source_id: String,
}

impl SourceRef {
    /// Creates a source reference, rejecting empty parts.
    pub fn new(
        source_type: impl Into<String>,
        source_id: impl Into<String>,
    ) -> Result<Self, InventoryError> {
        let source_type = source_type.into();
        let source_id = source_id.into();
        if source_type.is_empty() || source_id.is_empty() {
            return Err(InventoryError::Validation(
                "source type and id are required".to_string(),
            ));
        }
        Ok(Self {
            source_type,
            source_id,
        })
    }

    /// Returns the source document type.
    pub fn source_type(&self) -> &str {
        &self.source_type
    }

    /// Returns the source document ID.
    pub fn source_id(&self) -> &str {
        &self.source_id
    }
}

impl std::fmt::Display for SourceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.source_type, self.source_id)
    }
}

/// Lifecycle state of a stock lock.
///
/// A lock starts `Active` and makes exactly one terminal transition:
/// to `Released` (quantity returned to available) or to `Consumed`
/// (quantity left the system). There is no transition out of a terminal
/// state. The database stores this as two boolean columns;
/// [`LockState::from_flags`] converts at the mapping boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockState {
    /// The reservation is holding quantity.
    Active,
    /// The reservation was cancelled or expired; quantity went back to available.
    Released,
    /// The reservation was fulfilled; quantity left the system.
    Consumed,
}

impl LockState {
    /// Reconstructs the state from the persisted boolean flags.
    pub fn from_flags(released: bool, consumed: bool) -> Self {
        match (released, consumed) {
            (_, true) => Self::Consumed,
            (true, false) => Self::Released,
            (false, false) => Self::Active,
        }
    }

    /// Returns true once the lock has left the active state.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Active)
    }
}

impl std::fmt::Display for LockState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Released => write!(f, "released"),
            Self::Consumed => write!(f, "consumed"),
        }
    }
}

/// A reservation of stock quantity against one inventory item.
///
/// Locks are issued only by [`crate::InventoryItem::lock_stock`] and refer
/// back to their owner by ID: they persist as independent rows so that the
/// bulk expiration sweep can work without loading aggregates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockLock {
    id: LockId,
    item_id: ItemId,
    quantity: Quantity,
    source: SourceRef,
    expire_at: DateTime<Utc>,
    state: LockState,
    created_at: DateTime<Utc>,
    released_at: Option<DateTime<Utc>>,
}

impl StockLock {
    /// Issues a new active lock. Called by the aggregate only.
    pub(crate) fn issue(
        item_id: ItemId,
        quantity: Quantity,
        source: SourceRef,
        expire_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: LockId::new(),
            item_id,
            quantity,
            source,
            expire_at,
            state: LockState::Active,
            created_at: Utc::now(),
            released_at: None,
        }
    }

    /// Returns the lock ID.
    pub fn id(&self) -> LockId {
        self.id
    }

    /// Returns the owning inventory item's ID.
    pub fn item_id(&self) -> ItemId {
        self.item_id
    }

    /// Returns the reserved quantity.
    pub fn quantity(&self) -> Quantity {
        self.quantity
    }

    /// Returns the source document reference.
    pub fn source(&self) -> &SourceRef {
        &self.source
    }

    /// Returns the expiry timestamp.
    pub fn expire_at(&self) -> DateTime<Utc> {
        self.expire_at
    }

    /// Returns the lifecycle state.
    pub fn state(&self) -> LockState {
        self.state
    }

    /// Returns the creation timestamp.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns when the lock was released, if it was.
    pub fn released_at(&self) -> Option<DateTime<Utc>> {
        self.released_at
    }

    /// Returns true while the lock is holding quantity.
    pub fn is_active(&self) -> bool {
        self.state == LockState::Active
    }

    /// Returns true if the lock is active and expired relative to `now`.
    ///
    /// The reference time is supplied by the caller so that a batch sweep
    /// observes one consistent instant for every lock it examines.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active() && self.expire_at < now
    }

    /// Marks the lock released. Fails unless the lock is active.
    pub(crate) fn release(&mut self, now: DateTime<Utc>) -> Result<(), InventoryError> {
        if self.state.is_terminal() {
            return Err(InventoryError::InvalidLockState {
                id: self.id,
                state: self.state,
            });
        }
        self.state = LockState::Released;
        self.released_at = Some(now);
        Ok(())
    }

    /// Marks the lock consumed. Fails unless the lock is active.
    pub(crate) fn consume(&mut self) -> Result<(), InventoryError> {
        if self.state.is_terminal() {
            return Err(InventoryError::InvalidLockState {
                id: self.id,
                state: self.state,
            });
        }
        self.state = LockState::Consumed;
        Ok(())
    }

    /// Reconstructs a lock from its persisted record.
    pub fn from_record(record: LockRecord) -> Self {
        Self {
            id: record.id,
            item_id: record.item_id,
            quantity: record.quantity,
            source: record.source,
            expire_at: record.expire_at,
            state: LockState::from_flags(record.released, record.consumed),
            created_at: record.created_at,
            released_at: record.released_at,
        }
    }

    /// Captures the lock as a persistable record.
    pub fn to_record(&self) -> LockRecord {
        LockRecord {
            id: self.id,
            item_id: self.item_id,
            quantity: self.quantity,
            source: self.source.clone(),
            expire_at: self.expire_at,
            released: self.state == LockState::Released,
            consumed: self.state == LockState::Consumed,
            created_at: self.created_at,
            released_at: self.released_at,
        }
    }
}

/// Persisted shape of a stock lock, with the state flattened to the two
/// boolean columns the `stock_locks` table stores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockRecord {
    pub id: LockId,
    pub item_id: ItemId,
    pub quantity: Quantity,
    pub source: SourceRef,
    pub expire_at: DateTime<Utc>,
    pub released: bool,
    pub consumed: bool,
    pub created_at: DateTime<Utc>,
    pub released_at: Option<DateTime<Utc>>,
}
