//! # Status state machine
//!
//! Pure transition rules for order status, payment status and seller approval. The order flow API checks a request
//! against these rules using the snapshot it just read, and storage re-asserts the snapshot with a versioned
//! conditional update, so a rule can never be checked against stale state and then applied.
use crate::{
    db_types::{Order, OrderStatus, PaymentStatus, SellerApprovalStatus, SubOrder},
    traits::MarketplaceError,
};

/// Who is asking for a change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    Admin,
    Buyer(String),
    Seller(String),
    /// Background jobs, e.g. the stale order reconciler
    System,
}

/// Checks a move of `order_status`, for a master order or a sub-order.
pub fn check_order_transition(current: OrderStatus, next: OrderStatus) -> Result<(), MarketplaceError> {
    if current.is_terminal() {
        return Err(MarketplaceError::OrderLocked(current));
    }
    let allowed = match (current.rank(), next.rank()) {
        (_, None) => true,
        (Some(from), Some(to)) => to > from,
        (None, Some(_)) => false,
    };
    if allowed {
        Ok(())
    } else {
        Err(MarketplaceError::InvalidStatusTransition { from: current, to: next })
    }
}

/// Checks a cancellation on behalf of `actor`. Buyers may only cancel before shipment.
pub fn check_cancellation(order: &Order, actor: &Actor) -> Result<(), MarketplaceError> {
    if let Actor::Buyer(buyer_id) = actor {
        if &order.buyer_id != buyer_id {
            return Err(MarketplaceError::Forbidden(format!("Order {} does not belong to {buyer_id}", order.id)));
        }
    }
    check_order_transition(order.order_status, OrderStatus::Cancelled)?;
    if matches!(actor, Actor::Buyer(_)) && order.order_status == OrderStatus::Shipped {
        return Err(MarketplaceError::InvalidStatusTransition {
            from: order.order_status,
            to: OrderStatus::Cancelled,
        });
    }
    Ok(())
}

/// Multi-seller orders may not move to a fulfillment status while any live sub-order is waiting on its seller's
/// decision. This holds whatever the master's current status is, since payment advances it to `processing` on its own.
/// Single-seller orders, and cancellations, are never gated.
pub fn check_approval_gate(order: &Order, sub_orders: &[SubOrder], next: OrderStatus) -> Result<(), MarketplaceError> {
    if !order.is_master_order || next == OrderStatus::Cancelled {
        return Ok(());
    }
    let undecided = sub_orders
        .iter()
        .filter(|s| s.order_status != OrderStatus::Cancelled && !s.seller_approval_status.is_decided())
        .count();
    if undecided > 0 {
        return Err(MarketplaceError::PendingSellerApproval(undecided));
    }
    Ok(())
}

/// A sub-order its seller declined can only be cancelled.
pub fn check_declined_sub_order(sub_order: &SubOrder, next: OrderStatus) -> Result<(), MarketplaceError> {
    if sub_order.seller_approval_status == SellerApprovalStatus::NotApproved && next != OrderStatus::Cancelled {
        return Err(MarketplaceError::InvalidStatusTransition { from: sub_order.order_status, to: next });
    }
    Ok(())
}

/// Checks that `actor` may change a sub-order's status.
pub fn check_sub_order_owner(sub_order: &SubOrder, actor: &Actor) -> Result<(), MarketplaceError> {
    match actor {
        Actor::Seller(seller_id) if &sub_order.seller_id != seller_id => Err(MarketplaceError::Forbidden(format!(
            "Sub-order {} is not fulfilled by {seller_id}",
            sub_order.id
        ))),
        Actor::Buyer(_) => Err(MarketplaceError::Forbidden("Buyers cannot change sub-order status".into())),
        _ => Ok(()),
    }
}

pub fn check_payment_transition(current: PaymentStatus, next: PaymentStatus) -> Result<(), MarketplaceError> {
    use PaymentStatus::*;
    match (current, next) {
        (Pending, Paid) | (Pending, Failed) | (Paid, Refunded) => Ok(()),
        (from, to) => Err(MarketplaceError::InvalidPaymentTransition { from, to }),
    }
}

pub fn check_approval_transition(
    current: SellerApprovalStatus,
    next: SellerApprovalStatus,
) -> Result<(), MarketplaceError> {
    if current == SellerApprovalStatus::Pending && next.is_decided() {
        Ok(())
    } else {
        Err(MarketplaceError::InvalidApprovalTransition { from: current, to: next })
    }
}

/// The status a sub-order takes when its master order moves to `next`, or `None` if it stays where it is.
///
/// Fulfillment moves carry every non-terminal sub-order that is behind the master forward with it. A sub-order its
/// seller declined is cancelled instead, so it never ships and never releases earnings.
pub fn cascade_status(sub_order: &SubOrder, next: OrderStatus) -> Option<OrderStatus> {
    if sub_order.order_status.is_terminal() {
        return None;
    }
    if sub_order.seller_approval_status == SellerApprovalStatus::NotApproved {
        return Some(OrderStatus::Cancelled);
    }
    match (sub_order.order_status.rank(), next.rank()) {
        (_, None) => Some(OrderStatus::Cancelled),
        (Some(from), Some(to)) if to > from => Some(next),
        _ => None,
    }
}
