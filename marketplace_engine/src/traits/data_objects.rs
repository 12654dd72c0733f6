use chrono::{DateTime, Utc};
use mkt_common::Money;
use serde::{Deserialize, Serialize};

use crate::db_types::{Order, PaymentResult, PaymentStatus, RefundResult, SubOrder};

/// The result of a master order mutation: the updated order, and the sub-orders whose state changed with it.
#[derive(Debug, Clone)]
pub struct OrderTransition {
    pub order: Order,
    pub affected_sub_orders: Vec<SubOrder>,
}

/// A requested payment status change, with the processor artifacts that accompany it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentChange {
    pub status: PaymentStatus,
    pub payment_result: Option<PaymentResult>,
    pub refund_result: Option<RefundResult>,
}

impl PaymentChange {
    pub fn new(status: PaymentStatus) -> Self {
        Self { status, payment_result: None, refund_result: None }
    }

    pub fn paid(payment_result: Option<PaymentResult>) -> Self {
        Self { status: PaymentStatus::Paid, payment_result, refund_result: None }
    }

    pub fn refunded(refund_result: RefundResult) -> Self {
        Self { status: PaymentStatus::Refunded, payment_result: None, refund_result: Some(refund_result) }
    }
}

/// An optional, inclusive time window over `created_at`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn all_time() -> Self {
        Self::default()
    }

    pub fn between(since: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        Self { since: Some(since), until: Some(until) }
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }
}

/// Aggregated sales figures over paid sub-orders.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EarningsSummary {
    pub total_sales: Money,
    pub total_commission: Money,
    pub total_earnings: Money,
    /// Earnings on delivered sub-orders, payable to the seller
    pub released_earnings: Money,
    pub pending_earnings: Money,
    pub order_count: i64,
}

impl EarningsSummary {
    pub fn accumulate(mut self, other: &EarningsSummary) -> Self {
        self.total_sales += other.total_sales;
        self.total_commission += other.total_commission;
        self.total_earnings += other.total_earnings;
        self.released_earnings += other.released_earnings;
        self.pending_earnings += other.pending_earnings;
        self.order_count += other.order_count;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SellerCommission {
    pub seller_id: String,
    pub seller_name: Option<String>,
    pub summary: EarningsSummary,
}
