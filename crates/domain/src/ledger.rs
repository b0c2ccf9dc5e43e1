//! Append-only ledger of stock movements.
//!
//! Every inventory mutation can be recorded as a ledger entry in the same
//! database transaction as the mutation itself, giving collaborators an
//! audit trail with before/after balances. The engine provides the record
//! type and the store; which movements to record is the caller's decision.

use chrono::{DateTime, Utc};
use common::{ProductId, Quantity, TenantId, WarehouseId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::InventoryError;
use crate::ids::{EntryId, ItemId, LockId};
use crate::lock::SourceRef;

/// Kind of stock movement a ledger entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LedgerEntryType {
    /// Stock received into inventory (purchase receiving, sales return).
    Inbound,
    /// Stock shipped out of inventory (deduction of a lock).
    Outbound,
    /// Positive reconciliation against a physical count.
    AdjustmentIncrease,
    /// Negative reconciliation against a physical count.
    AdjustmentDecrease,
    /// Quantity reserved for a pending source document.
    Lock,
    /// Reserved quantity returned to available stock.
    Unlock,
}

impl LedgerEntryType {
    /// Returns the string stored in the `entry_type` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inbound => "INBOUND",
            Self::Outbound => "OUTBOUND",
            Self::AdjustmentIncrease => "ADJUSTMENT_INCREASE",
            Self::AdjustmentDecrease => "ADJUSTMENT_DECREASE",
            Self::Lock => "LOCK",
            Self::Unlock => "UNLOCK",
        }
    }

    /// Parses the persisted column value.
    pub fn parse(value: &str) -> Result<Self, InventoryError> {
        match value {
            "INBOUND" => Ok(Self::Inbound),
            "OUTBOUND" => Ok(Self::Outbound),
            "ADJUSTMENT_INCREASE" => Ok(Self::AdjustmentIncrease),
            "ADJUSTMENT_DECREASE" => Ok(Self::AdjustmentDecrease),
            "LOCK" => Ok(Self::Lock),
            "UNLOCK" => Ok(Self::Unlock),
            other => Err(InventoryError::Validation(format!(
                "unknown ledger entry type: {other}"
            ))),
        }
    }
}

impl std::fmt::Display for LedgerEntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One stock movement with its before/after available balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: EntryId,
    pub tenant_id: TenantId,
    pub item_id: ItemId,
    pub warehouse_id: WarehouseId,
    pub product_id: ProductId,
    pub entry_type: LedgerEntryType,
    pub quantity: Quantity,
    pub unit_cost: Decimal,
    pub balance_before: Quantity,
    pub balance_after: Quantity,
    pub source: SourceRef,
    pub lock_id: Option<LockId>,
    pub occurred_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Creates a new ledger entry. The moved quantity must be positive.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tenant_id: TenantId,
        item_id: ItemId,
        warehouse_id: WarehouseId,
        product_id: ProductId,
        entry_type: LedgerEntryType,
        quantity: Quantity,
        unit_cost: Decimal,
        balance_before: Quantity,
        balance_after: Quantity,
        source: SourceRef,
    ) -> Result<Self, InventoryError> {
        if !quantity.is_positive() {
            return Err(InventoryError::Validation(
                "ledger quantity must be positive".to_string(),
            ));
        }
        Ok(Self {
            id: EntryId::new(),
            tenant_id,
            item_id,
            warehouse_id,
            product_id,
            entry_type,
            quantity,
            unit_cost,
            balance_before,
            balance_after,
            source,
            lock_id: None,
            occurred_at: Utc::now(),
        })
    }

    /// Links the entry to the stock lock that caused the movement.
    pub fn with_lock_id(mut self, lock_id: LockId) -> Self {
        self.lock_id = Some(lock_id);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn entry_type_roundtrip() {
        for t in [
            LedgerEntryType::Inbound,
            LedgerEntryType::Outbound,
            LedgerEntryType::AdjustmentIncrease,
            LedgerEntryType::AdjustmentDecrease,
            LedgerEntryType::Lock,
            LedgerEntryType::Unlock,
        ] {
            assert_eq!(LedgerEntryType::parse(t.as_str()).unwrap(), t);
        }
        assert!(LedgerEntryType::parse("BOGUS").is_err());
    }

    #[test]
    fn entry_rejects_zero_quantity() {
        let result = LedgerEntry::new(
            TenantId::new(),
            ItemId::new(),
            WarehouseId::new(),
            ProductId::new(),
            LedgerEntryType::Lock,
            Quantity::zero(),
            dec!(10),
            Quantity::from(50u32),
            Quantity::from(50u32),
            SourceRef::new("order", "O-1").unwrap(),
        );
        assert!(matches!(result, Err(InventoryError::Validation(_))));
    }

    #[test]
    fn with_lock_id_links_the_lock() {
        let entry = LedgerEntry::new(
            TenantId::new(),
            ItemId::new(),
            WarehouseId::new(),
            ProductId::new(),
            LedgerEntryType::Lock,
            Quantity::from(5u32),
            dec!(10),
            Quantity::from(50u32),
            Quantity::from(45u32),
            SourceRef::new("order", "O-1").unwrap(),
        )
        .unwrap();
        let lock_id = LockId::new();
        assert_eq!(entry.with_lock_id(lock_id).lock_id, Some(lock_id));
    }
}
