//! Non-negative decimal quantity.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced by [`Quantity`] construction and arithmetic.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QuantityError {
    /// Attempted to construct a quantity from a negative decimal.
    #[error("quantity cannot be negative: {0}")]
    Negative(Decimal),

    /// Subtraction would have produced a result below zero.
    #[error("quantity underflow: {minuend} - {subtrahend}")]
    Underflow {
        minuend: Decimal,
        subtrahend: Decimal,
    },
}

/// A non-negative decimal amount of stock.
///
/// Quantities use arbitrary-precision decimal arithmetic so that many small
/// reservations never accumulate rounding drift. The type guarantees
/// non-negativity at construction: adding two quantities cannot go below
/// zero, and [`Quantity::checked_sub`] rejects any result that would.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Quantity(Decimal);

impl Quantity {
    /// Returns the zero quantity.
    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    /// Creates a quantity from a decimal, rejecting negative values.
    pub fn new(amount: Decimal) -> Result<Self, QuantityError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(QuantityError::Negative(amount));
        }
        Ok(Self(amount))
    }

    /// Returns the underlying decimal amount.
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// Returns true if the quantity is zero.
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Returns true if the quantity is strictly positive.
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// Adds another quantity. Two non-negative amounts cannot underflow.
    pub fn add(self, other: Quantity) -> Quantity {
        Quantity(self.0 + other.0)
    }

    /// Subtracts another quantity, rejecting results below zero.
    pub fn checked_sub(self, other: Quantity) -> Result<Quantity, QuantityError> {
        if other.0 > self.0 {
            return Err(QuantityError::Underflow {
                minuend: self.0,
                subtrahend: other.0,
            });
        }
        Ok(Quantity(self.0 - other.0))
    }
}

impl std::fmt::Display for Quantity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<Decimal> for Quantity {
    type Error = QuantityError;

    fn try_from(amount: Decimal) -> Result<Self, Self::Error> {
        Self::new(amount)
    }
}

impl From<u32> for Quantity {
    fn from(amount: u32) -> Self {
        Self(Decimal::from(amount))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn new_rejects_negative() {
        assert_eq!(
            Quantity::new(dec!(-0.01)),
            Err(QuantityError::Negative(dec!(-0.01)))
        );
        assert!(Quantity::new(dec!(0)).is_ok());
        assert!(Quantity::new(dec!(10.5)).is_ok());
    }

    #[test]
    fn add_is_exact() {
        let a = Quantity::new(dec!(0.1)).unwrap();
        let b = Quantity::new(dec!(0.2)).unwrap();
        assert_eq!(a.add(b).as_decimal(), dec!(0.3));
    }

    #[test]
    fn checked_sub_rejects_underflow() {
        let a = Quantity::from(5u32);
        let b = Quantity::from(7u32);
        assert!(matches!(
            a.checked_sub(b),
            Err(QuantityError::Underflow { .. })
        ));
        assert_eq!(b.checked_sub(a).unwrap(), Quantity::from(2u32));
    }

    #[test]
    fn serialization_is_transparent() {
        let q = Quantity::new(dec!(12.3400)).unwrap();
        let json = serde_json::to_string(&q).unwrap();
        let back: Quantity = serde_json::from_str(&json).unwrap();
        assert_eq!(q, back);
    }
}
