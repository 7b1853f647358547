//! Monetary amounts in Bhutanese Ngultrum.
//!
//! All computed charges in the storefront are whole-ngultrum amounts: every
//! pricing step rounds *up* to the next whole unit so the store never
//! undercharges. [`Ngultrum`] is the result type of those computations.
//! Catalog inputs and persisted order columns stay as [`rust_decimal::Decimal`].

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A whole-ngultrum monetary amount.
///
/// Produced by the pricing engine's ceiling arithmetic, so it is always
/// non-negative in practice. Displayed as `Nu. 126.00`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Ngultrum(i64);

impl Ngultrum {
    /// Zero ngultrum.
    pub const ZERO: Self = Self(0);

    /// Create an amount from a whole-ngultrum value.
    #[must_use]
    pub const fn new(amount: i64) -> Self {
        Self(amount)
    }

    /// Round a decimal amount up to the next whole ngultrum.
    ///
    /// Negative inputs clamp to zero first; unrepresentably large values
    /// saturate at `i64::MAX`. This function never panics - the pricing
    /// engine's fail-open policy depends on that.
    #[must_use]
    pub fn from_decimal_ceil(amount: Decimal) -> Self {
        use rust_decimal::prelude::ToPrimitive;

        let clamped = amount.max(Decimal::ZERO);
        Self(clamped.ceil().to_i64().unwrap_or(i64::MAX))
    }

    /// Get the underlying whole-ngultrum value.
    #[must_use]
    pub const fn as_i64(&self) -> i64 {
        self.0
    }

    /// Convert to a decimal for persistence or comparison with client totals.
    #[must_use]
    pub fn as_decimal(&self) -> Decimal {
        Decimal::from(self.0)
    }

    /// Whether the amount is zero.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Saturating addition.
    #[must_use]
    pub const fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    /// Multiply by a line quantity, saturating.
    #[must_use]
    pub const fn saturating_mul_quantity(self, quantity: u32) -> Self {
        Self(self.0.saturating_mul(quantity as i64))
    }
}

impl std::fmt::Display for Ngultrum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Nu. {}.00", self.0)
    }
}

impl std::iter::Sum for Ngultrum {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Self::saturating_add)
    }
}

/// ISO 4217 currency codes used by the storefront.
///
/// The catalog prices in CNY; the storefront displays and charges in BTN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    BTN,
    CNY,
}

impl CurrencyCode {
    /// The ISO code as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::BTN => "BTN",
            Self::CNY => "CNY",
        }
    }
}

impl std::fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_ceil_rounds_up() {
        let amount = Decimal::from_str("125.01").expect("decimal");
        assert_eq!(Ngultrum::from_decimal_ceil(amount), Ngultrum::new(126));
    }

    #[test]
    fn test_ceil_exact_value_unchanged() {
        let amount = Decimal::from_str("126.0").expect("decimal");
        assert_eq!(Ngultrum::from_decimal_ceil(amount), Ngultrum::new(126));
    }

    #[test]
    fn test_negative_clamps_to_zero() {
        let amount = Decimal::from_str("-3.5").expect("decimal");
        assert_eq!(Ngultrum::from_decimal_ceil(amount), Ngultrum::ZERO);
    }

    #[test]
    fn test_display() {
        assert_eq!(Ngultrum::new(126).to_string(), "Nu. 126.00");
    }

    #[test]
    fn test_sum() {
        let total: Ngultrum = [Ngultrum::new(10), Ngultrum::new(5), Ngultrum::new(1)]
            .into_iter()
            .sum();
        assert_eq!(total, Ngultrum::new(16));
    }

    #[test]
    fn test_quantity_multiplication() {
        assert_eq!(
            Ngultrum::new(141).saturating_mul_quantity(3),
            Ngultrum::new(423)
        );
    }
}
