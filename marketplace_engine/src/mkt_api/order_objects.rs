use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{OrderId, OrderStatus, PaymentStatus, SellerApprovalStatus},
    traits::{DateRange, EarningsSummary, SellerCommission},
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubOrderQueryFilter {
    pub seller_id: Option<String>,
    pub master_order_id: Option<OrderId>,
    pub order_status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub seller_approval_status: Option<SellerApprovalStatus>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl SubOrderQueryFilter {
    pub fn with_seller_id<S: Into<String>>(mut self, seller_id: S) -> Self {
        self.seller_id = Some(seller_id.into());
        self
    }

    pub fn with_master_order_id(mut self, id: OrderId) -> Self {
        self.master_order_id = Some(id);
        self
    }

    pub fn with_order_status(mut self, status: OrderStatus) -> Self {
        self.order_status = Some(status);
        self
    }

    pub fn with_payment_status(mut self, status: PaymentStatus) -> Self {
        self.payment_status = Some(status);
        self
    }

    pub fn with_approval_status(mut self, status: SellerApprovalStatus) -> Self {
        self.seller_approval_status = Some(status);
        self
    }

    pub fn within(mut self, range: &DateRange) -> Self {
        self.since = range.since;
        self.until = range.until;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.seller_id.is_none() &&
            self.master_order_id.is_none() &&
            self.order_status.is_none() &&
            self.payment_status.is_none() &&
            self.seller_approval_status.is_none() &&
            self.since.is_none() &&
            self.until.is_none()
    }
}

impl Display for SubOrderQueryFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return write!(f, "No filters.");
        }
        if let Some(seller) = &self.seller_id {
            write!(f, "seller: {seller}. ")?;
        }
        if let Some(id) = &self.master_order_id {
            write!(f, "order: {id}. ")?;
        }
        if let Some(status) = &self.order_status {
            write!(f, "status: {status}. ")?;
        }
        if let Some(status) = &self.payment_status {
            write!(f, "payment: {status}. ")?;
        }
        if let Some(approval) = &self.seller_approval_status {
            write!(f, "approval: {approval}. ")?;
        }
        if let Some(since) = &self.since {
            write!(f, "since: {since}. ")?;
        }
        if let Some(until) = &self.until {
            write!(f, "until: {until}. ")?;
        }
        Ok(())
    }
}

/// The outcome of one stale order reconciliation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaleOrderReport {
    /// Orders that matched the stale criteria when the run started
    pub total_candidates: usize,
    pub cancelled: usize,
    /// Candidates that were paid, cancelled or otherwise moved on by the time the reconciler got to them
    pub skipped: usize,
    pub failed: usize,
}

impl Display for StaleOrderReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} candidate(s): {} cancelled, {} skipped, {} failed",
            self.total_candidates, self.cancelled, self.skipped, self.failed
        )
    }
}

/// Platform-wide commission figures: one line per seller, plus the grand total.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionBreakdown {
    pub range: DateRange,
    pub sellers: Vec<SellerCommission>,
    pub totals: EarningsSummary,
}

/// What the engine did with a processor callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessorEventOutcome {
    Updated(crate::db_types::Order),
    /// The event needed no action. Carries the reason.
    Ignored(String),
}
