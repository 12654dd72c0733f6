use serde::{Deserialize, Serialize};

use crate::db_types::{Order, RefundResult, SubOrder};

/// A checkout was split and persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCreatedEvent {
    pub order: Order,
    pub sub_orders: Vec<SubOrder>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPaidEvent {
    pub order: Order,
}

impl OrderPaidEvent {
    pub fn new(order: Order) -> Self {
        Self { order }
    }
}

/// The order was cancelled, by its buyer, an admin or the stale order reconciler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAnnulledEvent {
    pub order: Order,
    pub reason: String,
}

impl OrderAnnulledEvent {
    pub fn new<S: Into<String>>(order: Order, reason: S) -> Self {
        Self { order, reason: reason.into() }
    }
}

/// A sub-order was delivered and its seller earnings became payable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EarningsReleasedEvent {
    pub sub_order: SubOrder,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRefundedEvent {
    pub order: Order,
    pub refund: RefundResult,
}
