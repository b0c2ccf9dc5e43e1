//! Stock batch: one received lot, tracked for traceability and expiry.

use chrono::{DateTime, NaiveDate, Utc};
use common::Quantity;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::InventoryError;
use crate::ids::{BatchId, ItemId};

/// Batch metadata supplied at receiving time. The batch number is
/// mandatory; production and expiry dates are optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchInfo {
    batch_number: String,
    production_date: Option<NaiveDate>,
    expiry_date: Option<NaiveDate>,
}

impl BatchInfo {
    /// Creates batch metadata, rejecting an empty batch number.
    pub fn new(
        batch_number: impl Into<String>,
        production_date: Option<NaiveDate>,
        expiry_date: Option<NaiveDate>,
    ) -> Result<Self, InventoryError> {
        let batch_number = batch_number.into();
        if batch_number.is_empty() {
            return Err(InventoryError::Validation(
                "batch number is required".to_string(),
            ));
        }
        Ok(Self {
            batch_number,
            production_date,
            expiry_date,
        })
    }

    /// Returns the batch number.
    pub fn batch_number(&self) -> &str {
        &self.batch_number
    }
}

/// One received lot of stock against an inventory item.
///
/// Batches are recorded by
/// [`crate::InventoryItem::increase_stock_batched`] and persist as
/// independent rows, like locks: the item references them by ID only, so
/// traceability queries (expiring lots, lot lookup by number) run without
/// loading aggregates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockBatch {
    pub id: BatchId,
    pub item_id: ItemId,
    pub batch_number: String,
    pub production_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    pub quantity: Quantity,
    pub unit_cost: Decimal,
    pub consumed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StockBatch {
    /// Records a newly received lot. The received quantity must be positive.
    pub fn new(
        item_id: ItemId,
        info: BatchInfo,
        quantity: Quantity,
        unit_cost: Decimal,
    ) -> Result<Self, InventoryError> {
        if !quantity.is_positive() {
            return Err(InventoryError::Validation(
                "batch quantity must be positive".to_string(),
            ));
        }
        let now = Utc::now();
        Ok(Self {
            id: BatchId::new(),
            item_id,
            batch_number: info.batch_number,
            production_date: info.production_date,
            expiry_date: info.expiry_date,
            quantity,
            unit_cost,
            consumed: false,
            created_at: now,
            updated_at: now,
        })
    }

    /// Returns true if the lot has passed its expiry date on `date`.
    /// Lots without an expiry date never expire.
    pub fn is_expired_on(&self, date: NaiveDate) -> bool {
        self.expiry_date.is_some_and(|expiry| expiry < date)
    }

    /// Returns true if the lot still holds usable stock on `date`.
    pub fn is_available_on(&self, date: NaiveDate) -> bool {
        !self.consumed && !self.is_expired_on(date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn batch_info_requires_a_number() {
        assert!(BatchInfo::new("", None, None).is_err());
        assert!(BatchInfo::new("LOT-1", None, None).is_ok());
    }

    #[test]
    fn new_batch_rejects_zero_quantity() {
        let info = BatchInfo::new("LOT-1", None, None).unwrap();
        assert!(matches!(
            StockBatch::new(ItemId::new(), info, Quantity::zero(), dec!(10)),
            Err(InventoryError::Validation(_))
        ));
    }

    #[test]
    fn expiry_is_relative_to_the_given_date() {
        let info = BatchInfo::new("LOT-1", None, Some(date(2026, 6, 30))).unwrap();
        let batch =
            StockBatch::new(ItemId::new(), info, Quantity::from(10u32), dec!(10)).unwrap();

        assert!(!batch.is_expired_on(date(2026, 6, 30)));
        assert!(batch.is_expired_on(date(2026, 7, 1)));
        assert!(batch.is_available_on(date(2026, 6, 1)));
    }

    #[test]
    fn dateless_batches_never_expire() {
        let info = BatchInfo::new("LOT-1", None, None).unwrap();
        let batch =
            StockBatch::new(ItemId::new(), info, Quantity::from(10u32), dec!(10)).unwrap();
        assert!(!batch.is_expired_on(date(2099, 1, 1)));
        assert!(batch.is_available_on(date(2099, 1, 1)));
    }

    #[test]
    fn consumed_batches_are_unavailable() {
        let info = BatchInfo::new("LOT-1", None, None).unwrap();
        let mut batch =
            StockBatch::new(ItemId::new(), info, Quantity::from(10u32), dec!(10)).unwrap();
        batch.consumed = true;
        assert!(!batch.is_available_on(date(2026, 1, 1)));
    }
}
