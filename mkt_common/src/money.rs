use std::{
    fmt::Display,
    iter::Sum,
    ops::Add,
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::newtype_ops;

pub const DEFAULT_CURRENCY_CODE: &str = "usd";

/// The number of basis points in 100%.
const BASIS_POINTS: i128 = 10_000;

//--------------------------------------       Money         ---------------------------------------------------------
/// A monetary amount in the minor unit of its currency (e.g. cents).
///
/// Every price, tax, commission and refund in the marketplace is carried as an integer number of minor units, so the
/// value handed to the card processor is exactly the value that was computed at checkout.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct Money(i64);

newtype_ops!(Money { Add::add, Sub::sub } assign { AddAssign::add_assign, SubAssign::sub_assign });

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.copied().sum()
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

impl PartialEq for Money {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Money {}

impl TryFrom<u64> for Money {
    type Error = MoneyConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        i64::try_from(value)
            .map(Self)
            .map_err(|_| MoneyConversionError(format!("Value {value} is too large to convert to Money")))
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl Money {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub const fn from_minor(value: i64) -> Self {
        Self(value)
    }

    /// Creates an amount from a whole number of major units, e.g. `Money::from_major(12)` is 12.00.
    pub const fn from_major(units: i64) -> Self {
        Self(units * 100)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// `None` if the result does not fit in a monetary amount.
    pub fn checked_add(self, rhs: Money) -> Option<Money> {
        self.0.checked_add(rhs.0).map(Self)
    }

    pub fn checked_mul(self, rhs: i64) -> Option<Money> {
        self.0.checked_mul(rhs).map(Self)
    }

    /// Returns the given fraction of this amount, expressed in basis points (1% == 100bps), rounded half away from
    /// zero to the nearest minor unit.
    pub fn basis_points(&self, bps: u32) -> Self {
        let product = i128::from(self.0) * i128::from(bps);
        let half = BASIS_POINTS / 2;
        let rounded = if product >= 0 { (product + half) / BASIS_POINTS } else { (product - half) / BASIS_POINTS };
        // Only reachable for bps > 10_000
        Self(i64::try_from(rounded).unwrap_or(if rounded > 0 { i64::MAX } else { i64::MIN }))
    }
}
