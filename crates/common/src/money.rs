//! Monetary amounts.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Money amount represented in cents to avoid floating point drift.
///
/// On the wire an amount is a decimal number in major units, so
/// `Money::from_cents(2_500_000)` serializes as `25000.0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Money {
    cents: i64,
}

impl Money {
    /// Creates a new Money amount from cents.
    pub const fn from_cents(cents: i64) -> Self {
        Self { cents }
    }

    /// Creates a new Money amount from a whole number of major units.
    pub fn from_major(units: i64) -> Self {
        Self { cents: units * 100 }
    }

    /// Converts a decimal major-unit amount, rounding to the nearest cent.
    pub fn from_decimal(amount: f64) -> Self {
        Self {
            cents: (amount * 100.0).round() as i64,
        }
    }

    /// Returns zero money.
    pub fn zero() -> Self {
        Self { cents: 0 }
    }

    /// Returns the amount in cents.
    pub fn cents(&self) -> i64 {
        self.cents
    }

    /// Returns the amount as a decimal number of major units.
    pub fn as_decimal(&self) -> f64 {
        self.cents as f64 / 100.0
    }

    /// Returns true if the amount is negative.
    pub fn is_negative(&self) -> bool {
        self.cents < 0
    }

    /// Multiplies by a quantity, or `None` if the result does not fit.
    pub fn checked_multiply(&self, quantity: u32) -> Option<Money> {
        self.cents
            .checked_mul(i64::from(quantity))
            .map(Money::from_cents)
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.cents < 0 { "-" } else { "" };
        let abs = self.cents.abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money {
            cents: self.cents + rhs.cents,
        }
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_decimal())
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let amount = f64::deserialize(deserializer)?;
        if !amount.is_finite() {
            return Err(serde::de::Error::custom("amount must be a finite number"));
        }
        Ok(Money::from_decimal(amount))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multiply_is_exact() {
        let unit = Money::from_major(25_000);
        assert_eq!(unit.checked_multiply(2), Some(Money::from_major(50_000)));
        assert_eq!(Money::from_cents(333).checked_multiply(3).map(|m| m.cents()), Some(999));
    }

    #[test]
    fn multiply_reports_overflow() {
        let huge = Money::from_decimal(1e16);
        assert_eq!(huge.checked_multiply(10), None);
        assert_eq!(Money::from_cents(i64::MAX).checked_multiply(1), Some(Money::from_cents(i64::MAX)));
    }

    #[test]
    fn serializes_as_major_units() {
        let json = serde_json::to_value(Money::from_cents(1999)).unwrap();
        assert_eq!(json.as_f64(), Some(19.99));
    }

    #[test]
    fn deserializes_integers_and_decimals() {
        let whole: Money = serde_json::from_str("25000").unwrap();
        assert_eq!(whole.cents(), 2_500_000);

        let fractional: Money = serde_json::from_str("0.1").unwrap();
        assert_eq!(fractional.cents(), 10);
    }

    #[test]
    fn display_formats_two_decimals() {
        assert_eq!(Money::from_cents(1005).to_string(), "10.05");
        assert_eq!(Money::from_cents(-250).to_string(), "-2.50");
        assert_eq!(Money::zero().to_string(), "0.00");
    }
}
