use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Mul, Neg, Sub, SubAssign},
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

pub const DEFAULT_CURRENCY_CODE: &str = "NGN";

/// Tolerance for comparing monetary amounts: one minor unit (0.01 of the major unit).
pub const MONEY_EPSILON: Money = Money(1);

//--------------------------------------       Money        ----------------------------------------------------------
/// A monetary amount in minor units (hundredths of the major currency unit).
///
/// All value in the system is carried as an integer number of minor units so that ledger sums are exact. Fractional
/// intermediate results (currency conversion, commission splits) are rounded half-away-from-zero exactly once, at the
/// boundary where they become a `Money`.
#[derive(Debug, Clone, Copy, Default, Type, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Money(i64);

impl Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl Neg for Money {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self(-self.0)
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self::from(self.value() * rhs)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented as a monetary amount: {0}")]
pub struct MoneyConversionError(String);

impl From<i64> for Money {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl TryFrom<u64> for Money {
    type Error = MoneyConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value > i64::MAX as u64 {
            Err(MoneyConversionError(format!("Value {value} is too large to convert to Money")))
        } else {
            #[allow(clippy::cast_possible_wrap)]
            Ok(Self(value as i64))
        }
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let cents = self.0.abs();
        write!(f, "{sign}{}.{:02}", cents / 100, cents % 100)
    }
}

impl Money {
    pub fn value(&self) -> i64 {
        self.0
    }

    /// An amount expressed in major currency units, e.g. `Money::from_major(50)` is 50.00.
    pub fn from_major(units: i64) -> Self {
        Self(units * 100)
    }

    /// Round a fractional amount of minor units to the nearest whole minor unit, half-away-from-zero.
    pub fn from_minor_units_f64(value: f64) -> Self {
        #[allow(clippy::cast_possible_truncation)]
        Self(value.round() as i64)
    }

    /// Round a fractional amount of major units (e.g. a raw gateway amount of 49.995) to minor units.
    pub fn from_major_units_f64(value: f64) -> Self {
        Self::from_minor_units_f64(value * 100.0)
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// The absolute difference between two amounts, for epsilon comparisons.
    pub fn abs_diff(&self, other: Money) -> Money {
        Self((self.0 - other.0).abs())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn display_uses_two_decimal_places() {
        assert_eq!(format!("{}", Money::from(500_000)), "5000.00");
        assert_eq!(format!("{}", Money::from(85_001)), "850.01");
        assert_eq!(format!("{}", Money::from(-150)), "-1.50");
        assert_eq!(format!("{}", Money::from(7)), "0.07");
    }

    #[test]
    fn rounding_is_half_away_from_zero() {
        assert_eq!(Money::from_minor_units_f64(150.5), Money::from(151));
        assert_eq!(Money::from_minor_units_f64(-150.5), Money::from(-151));
        assert_eq!(Money::from_minor_units_f64(150.49), Money::from(150));
        assert_eq!(Money::from_major_units_f64(49.995), Money::from(5000));
    }

    #[test]
    fn sums_are_exact() {
        let entries = [Money::from(1), Money::from(99), Money::from(-50)];
        assert_eq!(entries.into_iter().sum::<Money>(), Money::from(50));
    }
}
