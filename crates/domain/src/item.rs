//! Inventory item aggregate.

use chrono::{DateTime, Utc};
use common::{ProductId, Quantity, TenantId, WarehouseId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::batch::{BatchInfo, StockBatch};
use crate::error::InventoryError;
use crate::ids::{ItemId, LockId};
use crate::lock::{SourceRef, StockLock};
use crate::version::Version;

/// Decimal places kept when recomputing the moving weighted average cost.
const COST_SCALE: u32 = 4;

/// Aggregate root tracking stock for one (tenant, warehouse, product) triple.
///
/// The item holds two quantities: `available` (sellable now) and `locked`
/// (reserved against pending source documents). Their sum is the
/// authoritative on-hand total; it only changes through
/// [`increase_stock`](Self::increase_stock),
/// [`deduct_stock`](Self::deduct_stock),
/// [`decrease_stock`](Self::decrease_stock) and
/// [`adjust_stock`](Self::adjust_stock) —
/// [`lock_stock`](Self::lock_stock)/[`unlock_stock`](Self::unlock_stock)
/// redistribute between the two without changing the total.
///
/// All state changes go through these methods; each validates fully before
/// mutating, and each successful mutation increments [`version`](Self::version)
/// by exactly 1. The version is what the store's conditional update compares
/// against, so a failed operation leaves nothing for a writer to persist.
///
/// Locks are owned by identity reference: the store does not preload them,
/// so callers hydrate the ones they need via [`attach_lock`](Self::attach_lock)
/// before unlocking or deducting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryItem {
    id: ItemId,
    tenant_id: TenantId,
    warehouse_id: WarehouseId,
    product_id: ProductId,
    available: Quantity,
    locked: Quantity,
    unit_cost: Decimal,
    min_quantity: Quantity,
    max_quantity: Quantity,
    version: Version,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(default)]
    locks: Vec<StockLock>,
}

impl InventoryItem {
    /// Creates a zero-quantity item for a warehouse-product combination.
    pub fn new(tenant_id: TenantId, warehouse_id: WarehouseId, product_id: ProductId) -> Self {
        let now = Utc::now();
        Self {
            id: ItemId::new(),
            tenant_id,
            warehouse_id,
            product_id,
            available: Quantity::zero(),
            locked: Quantity::zero(),
            unit_cost: Decimal::ZERO,
            min_quantity: Quantity::zero(),
            max_quantity: Quantity::zero(),
            version: Version::initial(),
            created_at: now,
            updated_at: now,
            locks: Vec::new(),
        }
    }

    /// Returns the item ID.
    pub fn id(&self) -> ItemId {
        self.id
    }

    /// Returns the owning tenant.
    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    /// Returns the warehouse.
    pub fn warehouse_id(&self) -> WarehouseId {
        self.warehouse_id
    }

    /// Returns the product.
    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    /// Returns the quantity available for immediate allocation.
    pub fn available(&self) -> Quantity {
        self.available
    }

    /// Returns the quantity reserved by active locks.
    pub fn locked(&self) -> Quantity {
        self.locked
    }

    /// Returns the moving weighted average unit cost.
    pub fn unit_cost(&self) -> Decimal {
        self.unit_cost
    }

    /// Returns the minimum stock threshold for replenishment alerts.
    pub fn min_quantity(&self) -> Quantity {
        self.min_quantity
    }

    /// Returns the maximum stock threshold.
    pub fn max_quantity(&self) -> Quantity {
        self.max_quantity
    }

    /// Returns the current version.
    pub fn version(&self) -> Version {
        self.version
    }

    /// Returns the creation timestamp.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the last-modified timestamp.
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns the locks currently loaded into the aggregate.
    pub fn locks(&self) -> &[StockLock] {
        &self.locks
    }

    /// Returns a loaded lock by ID.
    pub fn lock(&self, lock_id: LockId) -> Option<&StockLock> {
        self.locks.iter().find(|l| l.id() == lock_id)
    }

    /// Returns the authoritative on-hand total: available + locked.
    pub fn total_quantity(&self) -> Quantity {
        self.available.add(self.locked)
    }

    /// Returns the total inventory value: on-hand total times unit cost.
    pub fn total_value(&self) -> Decimal {
        self.total_quantity().as_decimal() * self.unit_cost
    }

    /// Returns true if the available quantity covers the request.
    pub fn can_fulfill(&self, quantity: Quantity) -> bool {
        quantity <= self.available
    }

    /// Returns true if any stock is available.
    pub fn has_available_stock(&self) -> bool {
        self.available.is_positive()
    }

    /// Returns true if the on-hand total fell below the minimum threshold.
    pub fn is_below_minimum(&self) -> bool {
        self.min_quantity.is_positive() && self.total_quantity() < self.min_quantity
    }

    /// Returns true if the on-hand total exceeds the maximum threshold.
    pub fn is_above_maximum(&self) -> bool {
        self.max_quantity.is_positive() && self.total_quantity() > self.max_quantity
    }

    /// Reserves quantity against a source document, returning the new lock.
    ///
    /// Moves quantity from available to locked; the on-hand total is
    /// unchanged. Fails with [`InventoryError::InsufficientStock`] when the
    /// request exceeds available stock.
    pub fn lock_stock(
        &mut self,
        quantity: Quantity,
        source: SourceRef,
        expire_at: DateTime<Utc>,
    ) -> Result<StockLock, InventoryError> {
        if !quantity.is_positive() {
            return Err(InventoryError::Validation(
                "lock quantity must be positive".to_string(),
            ));
        }
        if !self.can_fulfill(quantity) {
            return Err(InventoryError::InsufficientStock {
                requested: quantity,
                available: self.available,
            });
        }

        self.available = self.available.checked_sub(quantity)?;
        self.locked = self.locked.add(quantity);
        self.touch();

        let lock = StockLock::issue(self.id, quantity, source, expire_at);
        self.locks.push(lock.clone());
        Ok(lock)
    }

    /// Releases a lock, returning its quantity to available stock.
    ///
    /// The on-hand total is unchanged. Fails with
    /// [`InventoryError::LockNotFound`] if the lock is not loaded, or
    /// [`InventoryError::InvalidLockState`] if it already left the active
    /// state.
    pub fn unlock_stock(&mut self, lock_id: LockId) -> Result<(), InventoryError> {
        let idx = self.find_active(lock_id)?;
        let quantity = self.locks[idx].quantity();

        let locked = self.locked.checked_sub(quantity)?;
        let available = self.available.add(quantity);
        self.locks[idx].release(Utc::now())?;
        self.locked = locked;
        self.available = available;
        self.touch();
        Ok(())
    }

    /// Consumes a lock: the reserved quantity leaves the system (shipment).
    ///
    /// The on-hand total decreases by the lock's quantity; available stock
    /// is untouched. Same lookup and state rules as
    /// [`unlock_stock`](Self::unlock_stock).
    pub fn deduct_stock(&mut self, lock_id: LockId) -> Result<(), InventoryError> {
        let idx = self.find_active(lock_id)?;
        let quantity = self.locks[idx].quantity();

        let locked = self.locked.checked_sub(quantity)?;
        self.locks[idx].consume()?;
        self.locked = locked;
        self.touch();
        Ok(())
    }

    /// Adds stock and recalculates the unit cost as a moving weighted
    /// average of the existing on-hand value and the incoming valuation,
    /// rounded to 4 decimal places.
    pub fn increase_stock(
        &mut self,
        quantity: Quantity,
        unit_cost: Decimal,
    ) -> Result<(), InventoryError> {
        if !quantity.is_positive() {
            return Err(InventoryError::Validation(
                "quantity must be positive".to_string(),
            ));
        }
        if unit_cost.is_sign_negative() {
            return Err(InventoryError::Validation(
                "unit cost cannot be negative".to_string(),
            ));
        }

        let old_total = self.total_quantity().as_decimal();
        self.unit_cost = if old_total.is_zero() {
            unit_cost
        } else {
            let total_value = old_total * self.unit_cost + quantity.as_decimal() * unit_cost;
            (total_value / (old_total + quantity.as_decimal())).round_dp(COST_SCALE)
        };

        self.available = self.available.add(quantity);
        self.touch();
        Ok(())
    }

    /// Adds stock like [`increase_stock`](Self::increase_stock) and records
    /// the received lot as a [`StockBatch`] for traceability.
    ///
    /// The batch is returned for the caller to persist alongside the item,
    /// like locks. One mutation, one version increment.
    pub fn increase_stock_batched(
        &mut self,
        quantity: Quantity,
        unit_cost: Decimal,
        batch: BatchInfo,
    ) -> Result<StockBatch, InventoryError> {
        self.increase_stock(quantity, unit_cost)?;
        StockBatch::new(self.id, batch, quantity, unit_cost)
    }

    /// Directly decreases available stock without a prior lock, e.g. goods
    /// shipped back to a supplier on a purchase return.
    pub fn decrease_stock(&mut self, quantity: Quantity) -> Result<(), InventoryError> {
        if !quantity.is_positive() {
            return Err(InventoryError::Validation(
                "quantity must be positive".to_string(),
            ));
        }
        if quantity > self.available {
            return Err(InventoryError::InsufficientStock {
                requested: quantity,
                available: self.available,
            });
        }

        self.available = self.available.checked_sub(quantity)?;
        self.touch();
        Ok(())
    }

    /// Sets available stock to an absolute value from a physical count.
    ///
    /// Locked quantity is untouched; the on-hand total changes by the
    /// returned delta (negative when the count came up short). The reason
    /// is mandatory audit metadata.
    pub fn adjust_stock(
        &mut self,
        actual_quantity: Quantity,
        reason: &str,
    ) -> Result<Decimal, InventoryError> {
        if reason.is_empty() {
            return Err(InventoryError::Validation(
                "adjustment reason is required".to_string(),
            ));
        }

        let delta = actual_quantity.as_decimal() - self.available.as_decimal();
        self.available = actual_quantity;
        self.touch();
        Ok(delta)
    }

    /// Sets the minimum stock threshold.
    pub fn set_min_quantity(&mut self, quantity: Quantity) {
        self.min_quantity = quantity;
        self.touch();
    }

    /// Sets the maximum stock threshold.
    pub fn set_max_quantity(&mut self, quantity: Quantity) {
        self.max_quantity = quantity;
        self.touch();
    }

    /// Returns the loaded locks that are still holding quantity.
    pub fn active_locks(&self) -> impl Iterator<Item = &StockLock> {
        self.locks.iter().filter(|l| l.is_active())
    }

    /// Returns the loaded locks that are active but expired relative to
    /// `now`. The caller supplies the reference instant so one sweep
    /// observes a consistent expiry cutoff.
    pub fn expired_locks_at(&self, now: DateTime<Utc>) -> impl Iterator<Item = &StockLock> {
        self.locks.iter().filter(move |l| l.is_expired_at(now))
    }

    /// Releases every expired lock back to available stock and returns how
    /// many were released. Each release behaves exactly like
    /// [`unlock_stock`](Self::unlock_stock), so the version advances once
    /// per released lock.
    pub fn release_expired_locks_at(&mut self, now: DateTime<Utc>) -> usize {
        let expired: Vec<LockId> = self.expired_locks_at(now).map(|l| l.id()).collect();
        let mut count = 0;
        for lock_id in expired {
            if self.unlock_stock(lock_id).is_ok() {
                count += 1;
            }
        }
        count
    }

    /// Hydrates a lock loaded from the lock store into the aggregate.
    ///
    /// Stores do not preload the lock association; a caller that wants to
    /// unlock or deduct attaches the lock it fetched first. Attaching a
    /// lock that belongs to a different item is rejected; re-attaching an
    /// already loaded lock is a no-op.
    pub fn attach_lock(&mut self, lock: StockLock) -> Result<(), InventoryError> {
        if lock.item_id() != self.id {
            return Err(InventoryError::Validation(format!(
                "lock {} belongs to item {}, not {}",
                lock.id(),
                lock.item_id(),
                self.id
            )));
        }
        if self.lock(lock.id()).is_none() {
            self.locks.push(lock);
        }
        Ok(())
    }

    /// Reconstructs an item from its persisted record, with no locks loaded.
    pub fn from_record(record: ItemRecord) -> Self {
        Self {
            id: record.id,
            tenant_id: record.tenant_id,
            warehouse_id: record.warehouse_id,
            product_id: record.product_id,
            available: record.available,
            locked: record.locked,
            unit_cost: record.unit_cost,
            min_quantity: record.min_quantity,
            max_quantity: record.max_quantity,
            version: record.version,
            created_at: record.created_at,
            updated_at: record.updated_at,
            locks: Vec::new(),
        }
    }

    /// Captures the item as a persistable record. Locks are persisted
    /// separately through the lock store.
    pub fn to_record(&self) -> ItemRecord {
        ItemRecord {
            id: self.id,
            tenant_id: self.tenant_id,
            warehouse_id: self.warehouse_id,
            product_id: self.product_id,
            available: self.available,
            locked: self.locked,
            unit_cost: self.unit_cost,
            min_quantity: self.min_quantity,
            max_quantity: self.max_quantity,
            version: self.version,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    fn find_active(&self, lock_id: LockId) -> Result<usize, InventoryError> {
        let idx = self
            .locks
            .iter()
            .position(|l| l.id() == lock_id)
            .ok_or(InventoryError::LockNotFound(lock_id))?;
        let state = self.locks[idx].state();
        if state.is_terminal() {
            return Err(InventoryError::InvalidLockState { id: lock_id, state });
        }
        Ok(idx)
    }

    fn touch(&mut self) {
        self.version.increment();
        self.updated_at = Utc::now();
    }
}

/// Persisted shape of an inventory item: the columns of `inventory_items`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemRecord {
    pub id: ItemId,
    pub tenant_id: TenantId,
    pub warehouse_id: WarehouseId,
    pub product_id: ProductId,
    pub available: Quantity,
    pub locked: Quantity,
    pub unit_cost: Decimal,
    pub min_quantity: Quantity,
    pub max_quantity: Quantity,
    pub version: Version,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock::LockState;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn qty(n: u32) -> Quantity {
        Quantity::from(n)
    }

    fn source(id: &str) -> SourceRef {
        SourceRef::new("order", id).unwrap()
    }

    fn item_with_stock(available: u32) -> InventoryItem {
        let mut item =
            InventoryItem::new(TenantId::new(), WarehouseId::new(), ProductId::new());
        item.increase_stock(qty(available), dec!(10)).unwrap();
        item
    }

    fn in_30_min() -> DateTime<Utc> {
        Utc::now() + Duration::minutes(30)
    }

    #[test]
    fn new_item_is_empty_at_version_one() {
        let item = InventoryItem::new(TenantId::new(), WarehouseId::new(), ProductId::new());
        assert!(item.available().is_zero());
        assert!(item.locked().is_zero());
        assert_eq!(item.version(), Version::initial());
        assert!(!item.has_available_stock());
    }

    #[test]
    fn lock_redistributes_without_changing_total() {
        let mut item = item_with_stock(100);
        let total_before = item.total_quantity();

        let lock = item
            .lock_stock(qty(30), source("O-1"), in_30_min())
            .unwrap();

        assert_eq!(item.available(), qty(70));
        assert_eq!(item.locked(), qty(30));
        assert_eq!(item.total_quantity(), total_before);
        assert_eq!(lock.quantity(), qty(30));
        assert!(lock.is_active());
    }

    #[test]
    fn lock_then_unlock_restores_pre_lock_state() {
        let mut item = item_with_stock(100);
        let lock = item
            .lock_stock(qty(25), source("O-1"), in_30_min())
            .unwrap();

        item.unlock_stock(lock.id()).unwrap();

        assert_eq!(item.available(), qty(100));
        assert!(item.locked().is_zero());
        assert_eq!(item.total_quantity(), qty(100));
        assert_eq!(item.lock(lock.id()).unwrap().state(), LockState::Released);
    }

    #[test]
    fn deduct_removes_quantity_from_total() {
        let mut item = item_with_stock(100);
        let lock = item
            .lock_stock(qty(30), source("O-1"), in_30_min())
            .unwrap();
        let available_after_lock = item.available();

        item.deduct_stock(lock.id()).unwrap();

        assert_eq!(item.available(), available_after_lock);
        assert!(item.locked().is_zero());
        assert_eq!(item.total_quantity(), qty(70));
        assert_eq!(item.lock(lock.id()).unwrap().state(), LockState::Consumed);
    }

    #[test]
    fn oversell_is_rejected_and_state_unchanged() {
        let mut item = item_with_stock(50);
        let version_before = item.version();

        let err = item
            .lock_stock(qty(51), source("O-1"), in_30_min())
            .unwrap_err();
        assert!(matches!(err, InventoryError::InsufficientStock { .. }));
        assert_eq!(item.available(), qty(50));
        assert_eq!(item.version(), version_before);

        item.lock_stock(qty(50), source("O-2"), in_30_min()).unwrap();
        assert!(matches!(
            item.lock_stock(qty(1), source("O-3"), in_30_min()),
            Err(InventoryError::InsufficientStock { .. })
        ));
    }

    #[test]
    fn non_positive_lock_quantity_is_rejected() {
        let mut item = item_with_stock(10);
        assert!(matches!(
            item.lock_stock(Quantity::zero(), source("O-1"), in_30_min()),
            Err(InventoryError::Validation(_))
        ));
    }

    #[test]
    fn terminal_locks_reject_further_transitions() {
        let mut item = item_with_stock(100);
        let consumed = item
            .lock_stock(qty(10), source("O-1"), in_30_min())
            .unwrap();
        let released = item
            .lock_stock(qty(10), source("O-2"), in_30_min())
            .unwrap();

        item.deduct_stock(consumed.id()).unwrap();
        item.unlock_stock(released.id()).unwrap();

        assert!(matches!(
            item.unlock_stock(consumed.id()),
            Err(InventoryError::InvalidLockState { .. })
        ));
        assert!(matches!(
            item.deduct_stock(released.id()),
            Err(InventoryError::InvalidLockState { .. })
        ));
    }

    #[test]
    fn unknown_lock_id_is_not_found() {
        let mut item = item_with_stock(10);
        assert!(matches!(
            item.unlock_stock(LockId::new()),
            Err(InventoryError::LockNotFound(_))
        ));
    }

    #[test]
    fn weighted_average_cost_on_increase() {
        let mut item =
            InventoryItem::new(TenantId::new(), WarehouseId::new(), ProductId::new());
        item.increase_stock(qty(10), dec!(10)).unwrap();
        assert_eq!(item.unit_cost(), dec!(10));

        // (10 * 10 + 30 * 14) / 40 = 13
        item.increase_stock(qty(30), dec!(14)).unwrap();
        assert_eq!(item.unit_cost(), dec!(13));
        assert_eq!(item.available(), qty(40));
    }

    #[test]
    fn weighted_average_cost_is_rounded_to_four_places() {
        let mut item =
            InventoryItem::new(TenantId::new(), WarehouseId::new(), ProductId::new());
        item.increase_stock(qty(3), dec!(10)).unwrap();
        // (3 * 10 + 1 * 11) / 4 = 10.25; (4*10.25 + 3*10)/7 = 10.142857...
        item.increase_stock(qty(1), dec!(11)).unwrap();
        item.increase_stock(qty(3), dec!(10)).unwrap();
        assert_eq!(item.unit_cost(), dec!(10.1429));
    }

    #[test]
    fn batched_increase_records_the_lot() {
        let mut item =
            InventoryItem::new(TenantId::new(), WarehouseId::new(), ProductId::new());
        let version_before = item.version();

        let info = BatchInfo::new("LOT-7", None, None).unwrap();
        let batch = item
            .increase_stock_batched(qty(40), dec!(12), info)
            .unwrap();

        assert_eq!(batch.item_id, item.id());
        assert_eq!(batch.batch_number, "LOT-7");
        assert_eq!(batch.quantity, qty(40));
        assert_eq!(batch.unit_cost, dec!(12));
        assert!(!batch.consumed);
        assert_eq!(item.available(), qty(40));
        assert_eq!(item.version().as_i64(), version_before.as_i64() + 1);
    }

    #[test]
    fn increase_rejects_invalid_input() {
        let mut item = item_with_stock(10);
        assert!(matches!(
            item.increase_stock(Quantity::zero(), dec!(5)),
            Err(InventoryError::Validation(_))
        ));
        assert!(matches!(
            item.increase_stock(qty(1), dec!(-1)),
            Err(InventoryError::Validation(_))
        ));
    }

    #[test]
    fn decrease_requires_available_stock() {
        let mut item = item_with_stock(10);
        item.decrease_stock(qty(4)).unwrap();
        assert_eq!(item.available(), qty(6));
        assert!(matches!(
            item.decrease_stock(qty(7)),
            Err(InventoryError::InsufficientStock { .. })
        ));
    }

    #[test]
    fn adjust_sets_absolute_available_and_reports_delta() {
        let mut item = item_with_stock(100);
        item.lock_stock(qty(20), source("O-1"), in_30_min()).unwrap();

        let delta = item.adjust_stock(qty(75), "cycle count").unwrap();
        assert_eq!(delta, dec!(-5));
        assert_eq!(item.available(), qty(75));
        assert_eq!(item.locked(), qty(20));

        assert!(matches!(
            item.adjust_stock(qty(10), ""),
            Err(InventoryError::Validation(_))
        ));
    }

    #[test]
    fn expiration_sweep_releases_only_expired_locks() {
        let mut item = item_with_stock(100);
        let now = Utc::now();
        let expired = item
            .lock_stock(qty(15), source("O-1"), now - Duration::minutes(5))
            .unwrap();
        let live = item
            .lock_stock(qty(10), source("O-2"), now + Duration::minutes(30))
            .unwrap();

        let released = item.release_expired_locks_at(now);

        assert_eq!(released, 1);
        assert_eq!(item.available(), qty(90));
        assert_eq!(item.locked(), qty(10));
        assert_eq!(item.lock(expired.id()).unwrap().state(), LockState::Released);
        assert!(item.lock(live.id()).unwrap().is_active());
    }

    #[test]
    fn sweep_increments_version_once_per_released_lock() {
        let mut item = item_with_stock(100);
        let now = Utc::now();
        item.lock_stock(qty(5), source("O-1"), now - Duration::minutes(1))
            .unwrap();
        item.lock_stock(qty(5), source("O-2"), now - Duration::minutes(2))
            .unwrap();
        let version_before = item.version();

        let released = item.release_expired_locks_at(now);

        assert_eq!(released, 2);
        assert_eq!(item.version().as_i64(), version_before.as_i64() + 2);
    }

    #[test]
    fn threshold_queries() {
        let mut item = item_with_stock(10);
        item.set_min_quantity(qty(20));
        assert!(item.is_below_minimum());
        item.set_max_quantity(qty(5));
        assert!(item.is_above_maximum());
    }

    #[test]
    fn attach_lock_rejects_foreign_locks() {
        let mut a = item_with_stock(10);
        let mut b = item_with_stock(10);
        let lock = b.lock_stock(qty(5), source("O-1"), in_30_min()).unwrap();

        assert!(matches!(
            a.attach_lock(lock.clone()),
            Err(InventoryError::Validation(_))
        ));

        // Re-attaching an already loaded lock is a no-op.
        let loaded = b.locks().len();
        b.attach_lock(lock).unwrap();
        assert_eq!(b.locks().len(), loaded);
    }

    #[test]
    fn end_to_end_reservation_flow() {
        let mut item = item_with_stock(100);
        // increase_stock bumped the version once already.
        let base = item.version().as_i64();
        assert_eq!(item.available(), qty(100));
        assert!(item.locked().is_zero());

        let o1 = item.lock_stock(qty(30), source("O-1"), in_30_min()).unwrap();
        assert_eq!(item.available(), qty(70));
        assert_eq!(item.locked(), qty(30));
        assert_eq!(item.version().as_i64(), base + 1);

        let o2 = item.lock_stock(qty(20), source("O-2"), in_30_min()).unwrap();
        assert_eq!(item.available(), qty(50));
        assert_eq!(item.locked(), qty(50));
        assert_eq!(item.version().as_i64(), base + 2);

        item.deduct_stock(o1.id()).unwrap();
        assert_eq!(item.available(), qty(50));
        assert_eq!(item.locked(), qty(20));
        assert_eq!(item.total_quantity(), qty(70));
        assert_eq!(item.version().as_i64(), base + 3);

        item.unlock_stock(o2.id()).unwrap();
        assert_eq!(item.available(), qty(70));
        assert!(item.locked().is_zero());
        assert_eq!(item.total_quantity(), qty(70));
        assert_eq!(item.version().as_i64(), base + 4);
    }

    #[test]
    fn record_roundtrip_drops_locks() {
        let mut item = item_with_stock(50);
        item.lock_stock(qty(10), source("O-1"), in_30_min()).unwrap();

        let back = InventoryItem::from_record(item.to_record());
        assert_eq!(back.id(), item.id());
        assert_eq!(back.available(), item.available());
        assert_eq!(back.locked(), item.locked());
        assert_eq!(back.version(), item.version());
        assert!(back.locks().is_empty());
    }
}
