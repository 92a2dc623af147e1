//! Monetary amounts.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A monetary amount with two fractional digits.
///
/// Serialized as a decimal string (`"1060.00"`) so that no precision is lost
/// through JSON.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    /// Number of fractional digits kept for every amount.
    pub const SCALE: u32 = 2;

    /// Creates an amount from a decimal, rounding to two fractional digits.
    pub fn new(amount: Decimal) -> Self {
        let mut amount = amount.round_dp(Self::SCALE);
        amount.rescale(Self::SCALE);
        Self(amount)
    }

    /// Creates an amount from minor units (e.g. 1050 = 10.50).
    pub fn from_cents(cents: i64) -> Self {
        Self(Decimal::new(cents, Self::SCALE))
    }

    /// Creates an amount from whole units (e.g. 500 = 500.00).
    pub fn from_major(units: i64) -> Self {
        Self::from_cents(units * 100)
    }

    /// Returns zero.
    pub fn zero() -> Self {
        Self::from_cents(0)
    }

    /// Parses a decimal string. Returns `None` for anything that is not a number.
    pub fn parse(s: &str) -> Option<Self> {
        Decimal::from_str(s.trim()).ok().map(Self::new)
    }

    /// Returns the underlying decimal.
    pub fn amount(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    /// Multiplies by a quantity. `None` on decimal overflow.
    pub fn checked_multiply(&self, quantity: u32) -> Option<Money> {
        self.0.checked_mul(Decimal::from(quantity)).map(Self::new)
    }

    /// `None` on decimal overflow.
    pub fn checked_add(&self, rhs: Money) -> Option<Money> {
        self.0.checked_add(rhs.0).map(Self::new)
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Decimal> for Money {
    fn from(amount: Decimal) -> Self {
        Self::new(amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_major_has_two_fractional_digits() {
        assert_eq!(Money::from_major(500).to_string(), "500.00");
        assert_eq!(Money::from_cents(1050).to_string(), "10.50");
    }

    #[test]
    fn multiply_and_add() {
        let laptops = Money::from_major(500).checked_multiply(2).unwrap();
        let mice = Money::from_major(20).checked_multiply(3).unwrap();
        let total = laptops.checked_add(mice).unwrap();
        assert_eq!(total, Money::from_major(1060));
        assert_eq!(total.to_string(), "1060.00");
    }

    #[test]
    fn overflow_is_reported_not_panicked() {
        let huge = Money::new(Decimal::MAX);
        assert_eq!(huge.checked_multiply(2), None);
        assert_eq!(huge.checked_add(huge), None);
        assert_eq!(huge.checked_multiply(1), Some(huge));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert_eq!(Money::parse(" 12.5 "), Some(Money::from_cents(1250)));
        assert_eq!(Money::parse("abc"), None);
        assert_eq!(Money::parse(""), None);
    }

    #[test]
    fn negative_detection() {
        assert!(Money::from_cents(-1).is_negative());
        assert!(!Money::zero().is_negative());
        assert!(Money::zero().is_zero());
    }

    #[test]
    fn serializes_as_string() {
        let json = serde_json::to_string(&Money::from_cents(999)).unwrap();
        assert_eq!(json, "\"9.99\"");
        let back: Money = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Money::from_cents(999));
    }
}
