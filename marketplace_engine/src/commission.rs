//! # Commission calculator
//!
//! Pure money arithmetic for the marketplace: the platform/seller split of a sub-order subtotal, and the derived
//! totals (tax, shipping) of a checkout. Everything works in integer minor units, so the invariants
//! `commission + seller_earnings == subtotal` and `total == items + tax + shipping` hold exactly.
use std::fmt::Display;

use mkt_common::Money;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 100% expressed in basis points
const FULL_RATE_BPS: u32 = 10_000;
/// Sales tax, 10%
pub const TAX_RATE_BPS: u32 = 1_000;
/// Orders whose items total strictly more than this ship for free
pub const FREE_SHIPPING_THRESHOLD: Money = Money::from_minor(100_00);
pub const FLAT_SHIPPING_PRICE: Money = Money::from_minor(10_00);
/// Default ceiling on seller commission rates, 50%
pub const DEFAULT_MAX_COMMISSION_RATE: CommissionRate = CommissionRate(5_000);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid commission rate: {0}")]
pub struct CommissionRateError(pub String);

//--------------------------------------    CommissionRate     ---------------------------------------------------------
/// A seller's commission rate, stored as basis points (1% == 100bps). Always within `[0%, 100%]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct CommissionRate(u32);

impl CommissionRate {
    pub fn from_basis_points(bps: u32) -> Result<Self, CommissionRateError> {
        if bps > FULL_RATE_BPS {
            return Err(CommissionRateError(format!("{bps}bps is more than 100%")));
        }
        Ok(Self(bps))
    }

    /// Builds a rate from a percentage, e.g. `12.5` for 12.5%. Precision beyond a hundredth of a percent is rounded.
    pub fn from_percent(percent: f64) -> Result<Self, CommissionRateError> {
        if !percent.is_finite() || !(0.0..=100.0).contains(&percent) {
            return Err(CommissionRateError(format!("{percent}% is not within [0, 100]")));
        }
        Self::from_basis_points((percent * 100.0).round() as u32)
    }

    pub fn basis_points(&self) -> u32 {
        self.0
    }

    pub fn as_percent(&self) -> f64 {
        f64::from(self.0) / 100.0
    }

    /// Fails if this rate exceeds `ceiling`.
    pub fn within(self, ceiling: CommissionRate) -> Result<Self, CommissionRateError> {
        if self > ceiling {
            return Err(CommissionRateError(format!("{self} exceeds the maximum commission rate of {ceiling}")));
        }
        Ok(self)
    }
}

impl TryFrom<u32> for CommissionRate {
    type Error = CommissionRateError;

    fn try_from(bps: u32) -> Result<Self, Self::Error> {
        Self::from_basis_points(bps)
    }
}

impl From<CommissionRate> for u32 {
    fn from(rate: CommissionRate) -> Self {
        rate.0
    }
}

impl Display for CommissionRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:02}%", self.0 / 100, self.0 % 100)
    }
}

//--------------------------------------    CommissionSplit    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionSplit {
    pub commission: Money,
    pub seller_earnings: Money,
}

/// Splits a subtotal between the platform and the seller.
///
/// The commission is rounded half-up to the nearest minor unit and the seller receives the remainder, so the two parts
/// always add back up to `subtotal`.
pub fn split(subtotal: Money, rate: CommissionRate) -> CommissionSplit {
    let commission = subtotal.basis_points(rate.basis_points());
    CommissionSplit { commission, seller_earnings: subtotal - commission }
}

//--------------------------------------      OrderTotals      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub items_price: Money,
    pub tax_price: Money,
    pub shipping_price: Money,
    pub total_price: Money,
}

/// Tax and shipping for an order, or `None` if the grand total does not fit in a monetary amount.
pub fn order_totals(items_price: Money) -> Option<OrderTotals> {
    let tax_price = items_price.basis_points(TAX_RATE_BPS);
    let shipping_price = if items_price > FREE_SHIPPING_THRESHOLD { Money::default() } else { FLAT_SHIPPING_PRICE };
    let total_price = items_price.checked_add(tax_price)?.checked_add(shipping_price)?;
    Some(OrderTotals { items_price, tax_price, shipping_price, total_price })
}
