//! Precision-safe ledger amounts.
//!
//! Uses `rust_decimal` for exact decimal arithmetic. The ledger tracks the
//! native asset with seven fractional digits, so every `Amount` is kept at
//! that scale.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};
use std::str::FromStr;

use crate::error::CoreError;

/// Smallest units (stroops) per whole native unit.
pub const STROOPS_PER_UNIT: i64 = 10_000_000;

/// Number of fractional digits the ledger keeps for amounts.
const LEDGER_SCALE: u32 = 7;

/// Native-asset amount with exact decimal precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(pub Decimal);

impl Amount {
    pub const ZERO: Self = Self(Decimal::ZERO);

    #[inline]
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    #[inline]
    pub fn inner(&self) -> Decimal {
        self.0
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    #[inline]
    pub fn is_positive(&self) -> bool {
        self.0.is_sign_positive() && !self.0.is_zero()
    }

    /// Subtract, flooring at zero.
    #[inline]
    pub fn saturating_sub(self, rhs: Amount) -> Amount {
        if rhs.0 >= self.0 {
            Amount::ZERO
        } else {
            Amount(self.0 - rhs.0)
        }
    }

    /// Truncate to the ledger's seven fractional digits.
    #[inline]
    pub fn to_ledger_scale(self) -> Amount {
        Amount(self.0.trunc_with_scale(LEDGER_SCALE))
    }

    /// Convert from stroops.
    #[inline]
    pub fn from_stroops(stroops: i64) -> Amount {
        Amount(Decimal::new(stroops, LEDGER_SCALE))
    }

    /// Lossy conversion for display fields that carry floats on the wire.
    pub fn to_f64(&self) -> f64 {
        use rust_decimal::prelude::ToPrimitive;
        self.0.to_f64().unwrap_or(0.0)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.7}", self.0)
    }
}

impl FromStr for Amount {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: Decimal = s
            .trim()
            .parse()
            .map_err(|e| CoreError::InvalidAmount(format!("{s:?}: {e}")))?;
        if value.is_sign_negative() {
            return Err(CoreError::InvalidAmount(format!("{s:?}: negative")));
        }
        Ok(Self(value).to_ledger_scale())
    }
}

impl From<Decimal> for Amount {
    fn from(d: Decimal) -> Self {
        Self(d)
    }
}

impl Add for Amount {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Amount {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

/// Per-operation fee bid in stroops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fee(pub u64);

impl Fee {
    #[inline]
    pub fn stroops(&self) -> u64 {
        self.0
    }

    /// Fee expressed in native units.
    pub fn as_amount(&self) -> Amount {
        Amount(Decimal::from(self.0) / Decimal::from(STROOPS_PER_UNIT))
    }
}

impl fmt::Display for Fee {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} stroops", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_amount_parse_truncates_to_ledger_scale() {
        let amount: Amount = "12.123456789".parse().unwrap();
        assert_eq!(amount.inner(), dec!(12.1234567));
    }

    #[test]
    fn test_amount_parse_rejects_garbage_and_negative() {
        assert!("abc".parse::<Amount>().is_err());
        assert!("-1".parse::<Amount>().is_err());
    }

    #[test]
    fn test_saturating_sub_floors_at_zero() {
        let a = Amount::new(dec!(1.5));
        let b = Amount::new(dec!(2));
        assert_eq!(a.saturating_sub(b), Amount::ZERO);
        assert_eq!(b.saturating_sub(a), Amount::new(dec!(0.5)));
    }

    #[test]
    fn test_display_uses_seven_digits() {
        assert_eq!(Amount::new(dec!(3)).to_string(), "3.0000000");
        assert_eq!(Amount::from_stroops(5).to_string(), "0.0000005");
    }

    #[test]
    fn test_fee_as_amount() {
        assert_eq!(Fee(5_000_000).as_amount().inner(), dec!(0.5));
    }
}
