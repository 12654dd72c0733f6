use chrono::{Duration, Utc};
use cucumber::{then, when};
use marketplace_engine::{
    db_types::{Checkout, Money, OrderStatus, PaymentMethod, PaymentResult, PaymentStatus, SellerApprovalStatus},
    test_utils::seed::address,
    CatalogManagement,
    MarketplaceError,
};

use crate::cucumber::MarketplaceWorld;

/// Parses "12.50" or "12" into minor units.
fn money(s: &str) -> Money {
    let (major, minor) = s.split_once('.').unwrap_or((s, "0"));
    let major = major.parse::<i64>().unwrap_or_else(|_| panic!("Invalid amount: {s}"));
    let minor = format!("{minor:0<2}").parse::<i64>().unwrap_or_else(|_| panic!("Invalid amount: {s}"));
    Money::from_minor(major * 100 + minor)
}

/// Parses "lamp x2, novel x1".
fn checkout(buyer: &str, method: &str, items: &str) -> Checkout {
    let method = method.parse::<PaymentMethod>().expect("Invalid payment method");
    items.split(',').map(str::trim).filter(|s| !s.is_empty()).fold(Checkout::new(buyer, address(), method), |c, line| {
        let (product, qty) = line.rsplit_once(" x").unwrap_or((line, "1"));
        c.with_item(product.trim(), qty.parse::<i64>().expect("Invalid quantity"))
    })
}

fn error_kind(e: &MarketplaceError) -> &'static str {
    match e {
        MarketplaceError::DatabaseError(_) => "DatabaseError",
        MarketplaceError::OrderNotFound(_) => "OrderNotFound",
        MarketplaceError::SubOrderNotFound(_) => "SubOrderNotFound",
        MarketplaceError::ProductNotFound(_) => "ProductNotFound",
        MarketplaceError::SellerNotFound(_) => "SellerNotFound",
        MarketplaceError::Forbidden(_) => "Forbidden",
        MarketplaceError::OrderLocked(_) => "OrderLocked",
        MarketplaceError::PendingSellerApproval(_) => "PendingSellerApproval",
        MarketplaceError::InvalidStatusTransition { .. } => "InvalidStatusTransition",
        MarketplaceError::InvalidPaymentTransition { .. } => "InvalidPaymentTransition",
        MarketplaceError::InvalidApprovalTransition { .. } => "InvalidApprovalTransition",
        MarketplaceError::OutOfStock { .. } => "OutOfStock",
        MarketplaceError::InsufficientStock { .. } => "InsufficientStock",
        MarketplaceError::InvalidCommissionRate(_) => "InvalidCommissionRate",
        MarketplaceError::RefundNotEligible(_) => "RefundNotEligible",
        MarketplaceError::AlreadyRefunded(_) => "AlreadyRefunded",
        MarketplaceError::PaymentProcessorError(_) => "PaymentProcessorError",
        MarketplaceError::ValidationError(_) => "ValidationError",
        MarketplaceError::VersionConflict(_) => "VersionConflict",
    }
}

fn status(s: &str) -> OrderStatus {
    s.parse::<OrderStatus>().expect("Invalid order status")
}

//-----------------------------------------------   Checkout   --------------------------------------------------------

#[when(expr = "'{word}' checks out {word} paying by {word} with {string}")]
async fn checks_out(world: &mut MarketplaceWorld, buyer: String, name: String, method: String, items: String) {
    let order = world.api().create_order(checkout(&buyer, &method, &items)).await.expect("Checkout failed");
    world.orders.insert(name, order.id);
}

#[when(expr = "'{word}' tries to check out paying by {word} with {string}")]
async fn tries_to_check_out(world: &mut MarketplaceWorld, buyer: String, method: String, items: String) {
    let result = world.api().create_order(checkout(&buyer, &method, &items)).await;
    world.record_outcome(result);
}

//-----------------------------------------------   Lifecycle   -------------------------------------------------------

#[when(expr = "the admin moves order {word} to {word}")]
async fn admin_moves(world: &mut MarketplaceWorld, name: String, new_status: String) {
    let id = world.order_id(&name);
    world.api().update_order_status(id, status(&new_status)).await.expect("Status update failed");
}

#[when(expr = "the admin tries to move order {word} to {word}")]
async fn admin_tries_to_move(world: &mut MarketplaceWorld, name: String, new_status: String) {
    let id = world.order_id(&name);
    let result = world.api().update_order_status(id, status(&new_status)).await;
    world.record_outcome(result);
}

#[when(expr = "'{word}' tries to cancel order {word}")]
async fn buyer_cancels(world: &mut MarketplaceWorld, buyer: String, name: String) {
    let id = world.order_id(&name);
    let result = world.api().cancel_order(id, &buyer).await;
    world.record_outcome(result);
}

#[when(expr = "seller '{word}' {word} their part of order {word}")]
async fn seller_decides(world: &mut MarketplaceWorld, seller: String, decision: String, name: String) {
    let approval = match decision.as_str() {
        "approves" => SellerApprovalStatus::Approved,
        "declines" => SellerApprovalStatus::NotApproved,
        other => panic!("Unknown decision: {other}"),
    };
    let sub = world.sub_order(&name, &seller).await;
    world.api().update_seller_approval(sub.id, approval).await.expect("Approval failed");
}

#[when(expr = "seller '{word}' marks their part of order {word} as {word}")]
async fn seller_marks(world: &mut MarketplaceWorld, seller: String, name: String, new_status: String) {
    let sub = world.sub_order(&name, &seller).await;
    let result = world.api().update_sub_order_status(sub.id, status(&new_status), Some(&seller)).await;
    world.record_outcome(result);
}

#[when(expr = "seller '{word}' tries to mark the part of order {word} sold by '{word}' as {word}")]
async fn seller_marks_other(world: &mut MarketplaceWorld, seller: String, name: String, owner: String, s: String) {
    let sub = world.sub_order(&name, &owner).await;
    let result = world.api().update_sub_order_status(sub.id, status(&s), Some(&seller)).await;
    world.record_outcome(result);
}

//-----------------------------------------------   Payments   --------------------------------------------------------

#[when(expr = "order {word} is paid by card with reference '{word}'")]
async fn paid_by_card(world: &mut MarketplaceWorld, name: String, reference: String) {
    let id = world.order_id(&name);
    let result =
        PaymentResult { id: reference, status: "succeeded".into(), update_time: Utc::now(), email: None };
    world.api().update_payment_status(id, PaymentStatus::Paid, Some(result)).await.expect("Payment failed");
}

#[when(expr = "order {word} is paid in cash")]
async fn paid_in_cash(world: &mut MarketplaceWorld, name: String) {
    let id = world.order_id(&name);
    world.api().update_payment_status(id, PaymentStatus::Paid, None).await.expect("Payment failed");
}

#[when(expr = "the processor charged {string} for order {word}")]
async fn charge_amount(world: &mut MarketplaceWorld, amount: String, _name: String) {
    world.system().processor.set_charge_amount(money(&amount));
}

#[when(expr = "the admin refunds order {word}")]
async fn refund(world: &mut MarketplaceWorld, name: String) {
    let id = world.order_id(&name);
    let result = world.system().payments.refund(id, None).await;
    world.record_outcome(result);
}

#[when(expr = "the admin refunds {string} of order {word}")]
async fn partial_refund(world: &mut MarketplaceWorld, amount: String, name: String) {
    let id = world.order_id(&name);
    let result = world.system().payments.refund(id, Some(money(&amount))).await;
    world.record_outcome(result);
}

//-----------------------------------------------   Stale orders   ----------------------------------------------------

#[when(expr = "{int} minutes pass")]
async fn time_passes(world: &mut MarketplaceWorld, minutes: i64) {
    world.system().clock.advance(Duration::minutes(minutes));
}

#[when(expr = "the stale order reconciler runs with a threshold of {int} minutes")]
async fn reconciler_runs(world: &mut MarketplaceWorld, minutes: i64) {
    let report = world.api().cancel_stale_orders(Duration::minutes(minutes)).await.expect("Reconciler failed");
    world.last_report = Some(report);
}

//-----------------------------------------------   Checks   ----------------------------------------------------------

#[then(expr = "the request fails with {word}")]
async fn request_fails(world: &mut MarketplaceWorld, kind: String) {
    let err = world.last_error.as_ref().expect("The request did not fail");
    assert_eq!(error_kind(err), kind, "Unexpected error: {err}");
}

#[then("the request succeeds")]
async fn request_succeeds(world: &mut MarketplaceWorld) {
    assert!(world.last_error.is_none(), "Request failed: {:?}", world.last_error);
}

#[then(expr = "order {word} has status {word}")]
async fn order_has_status(world: &mut MarketplaceWorld, name: String, expected: String) {
    assert_eq!(world.order(&name).await.order_status, status(&expected));
}

#[then(expr = "order {word} has payment status {word}")]
async fn order_has_payment_status(world: &mut MarketplaceWorld, name: String, expected: String) {
    let expected = expected.parse::<PaymentStatus>().expect("Invalid payment status");
    assert_eq!(world.order(&name).await.payment_status, expected);
}

#[then(expr = "order {word} costs {string} with {string} tax and {string} shipping")]
async fn order_costs(world: &mut MarketplaceWorld, name: String, total: String, tax: String, shipping: String) {
    let order = world.order(&name).await;
    assert_eq!(order.total_price, money(&total));
    assert_eq!(order.tax_price, money(&tax));
    assert_eq!(order.shipping_price, money(&shipping));
    assert_eq!(order.items_price + order.tax_price + order.shipping_price, order.total_price);
}

#[then(expr = "order {word} is split into {int} sub-order(s)")]
async fn split_into(world: &mut MarketplaceWorld, name: String, count: usize) {
    let order = world.order(&name).await;
    assert_eq!(order.sub_orders.len(), count);
    assert_eq!(order.is_master_order, count > 1);
    let subs = world.api().fetch_sub_orders_for_order(order.id).await.expect("Error fetching sub-orders");
    let subtotal: Money = subs.iter().map(|s| s.subtotal).sum();
    assert_eq!(subtotal, order.items_price);
}

#[then(expr = "the part of order {word} sold by '{word}' has subtotal {string}, commission {string} and earnings {string}")]
async fn sub_order_split(
    world: &mut MarketplaceWorld,
    name: String,
    seller: String,
    subtotal: String,
    commission: String,
    earnings: String,
) {
    let sub = world.sub_order(&name, &seller).await;
    assert_eq!(sub.subtotal, money(&subtotal));
    assert_eq!(sub.commission, money(&commission));
    assert_eq!(sub.seller_earnings, money(&earnings));
}

#[then(expr = "the part of order {word} sold by '{word}' has status {word}")]
async fn sub_order_status(world: &mut MarketplaceWorld, name: String, seller: String, expected: String) {
    assert_eq!(world.sub_order(&name, &seller).await.order_status, status(&expected));
}

#[then(expr = "the earnings of '{word}' on order {word} are {word}")]
async fn earnings_released(world: &mut MarketplaceWorld, seller: String, name: String, state: String) {
    let sub = world.sub_order(&name, &seller).await;
    match state.as_str() {
        "released" => assert!(sub.earnings_released && sub.delivered_at.is_some()),
        "held" => assert!(!sub.earnings_released),
        other => panic!("Unknown earnings state: {other}"),
    }
}

#[then(expr = "product '{word}' has {int} in stock")]
async fn stock_level(world: &mut MarketplaceWorld, product_id: String, expected: i64) {
    let product = world.api().db().fetch_product(&product_id).await.expect("Error fetching product");
    assert_eq!(product.expect("No such product").stock, expected);
}

#[then(expr = "the reconciler cancelled {int} order(s)")]
async fn reconciler_cancelled(world: &mut MarketplaceWorld, expected: usize) {
    let report = world.last_report.expect("The reconciler has not run");
    assert_eq!(report.cancelled, expected, "{report}");
    assert_eq!(report.failed, 0, "{report}");
}

#[then(expr = "order {word} was refunded {string}")]
async fn refunded_amount(world: &mut MarketplaceWorld, name: String, amount: String) {
    let order = world.order(&name).await;
    let refund = order.refund_result.expect("No refund recorded");
    assert_eq!(refund.amount, money(&amount));
    let subs = world.api().fetch_sub_orders_for_order(order.id).await.expect("Error fetching sub-orders");
    assert!(subs.iter().all(|s| s.payment_status == PaymentStatus::Refunded));
}

#[then(expr = "'{word}' has {int} order(s)")]
async fn buyer_orders(world: &mut MarketplaceWorld, buyer: String, expected: usize) {
    let orders = world.api().fetch_orders_for_buyer(&buyer).await.expect("Error fetching orders");
    assert_eq!(orders.len(), expected);
}
