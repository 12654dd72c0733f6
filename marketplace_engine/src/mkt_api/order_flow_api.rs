use std::{fmt::Debug, future::Future, sync::Arc};

use chrono::Duration;
use log::*;

use crate::{
    db_types::{
        Checkout,
        Order,
        OrderId,
        OrderStatus,
        PaymentMethod,
        PaymentResult,
        PaymentStatus,
        RefundResult,
        SellerApprovalStatus,
        SubOrder,
        SubOrderId,
    },
    events::{
        EarningsReleasedEvent,
        EventProducers,
        OrderAnnulledEvent,
        OrderCreatedEvent,
        OrderPaidEvent,
        OrderRefundedEvent,
    },
    helpers::{Clock, SystemClock},
    order_objects::{StaleOrderReport, SubOrderQueryFilter},
    order_splitter::{validate_checkout, SplitPolicy},
    state_machine::{
        check_approval_gate,
        check_approval_transition,
        check_cancellation,
        check_declined_sub_order,
        check_order_transition,
        check_payment_transition,
        check_sub_order_owner,
        Actor,
    },
    traits::{MarketplaceDatabase, MarketplaceError, OrderTransition, PaymentChange},
};

/// How many times a mutation is re-read and re-tried after losing a race to a concurrent writer.
const MAX_ATTEMPTS: usize = 3;

/// Runs `attempt` until it succeeds, fails for a reason other than a version conflict, or runs out of attempts.
///
/// Every attempt must re-read the entity it mutates, so that business rules are re-checked against fresh state.
async fn retry_on_conflict<T, F, Fut>(what: &str, mut attempt: F) -> Result<T, MarketplaceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, MarketplaceError>>,
{
    let mut tries = 1;
    loop {
        match attempt().await {
            Err(MarketplaceError::VersionConflict(msg)) if tries < MAX_ATTEMPTS => {
                debug!("🔄️ {what} lost a race ({msg}). Retrying ({tries}/{MAX_ATTEMPTS})");
                tries += 1;
                tokio::task::yield_now().await;
            },
            result => return result,
        }
    }
}

/// `OrderFlowApi` is the primary API for the order lifecycle: checkout, status changes, seller approval, payment
/// status, and the reconciliation of stale unpaid orders.
///
/// Every mutation reads the current state, checks it against the rules in [`crate::state_machine`], and hands the
/// snapshot to the backend, which only applies the change if nobody else has modified the record in the meantime.
pub struct OrderFlowApi<B> {
    db: B,
    producers: EventProducers,
    clock: Arc<dyn Clock>,
    policy: SplitPolicy,
}

impl<B> Debug for OrderFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi ({:?}, {:?})", self.clock, self.policy)
    }
}

impl<B: Clone> Clone for OrderFlowApi<B> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            producers: self.producers.clone(),
            clock: Arc::clone(&self.clock),
            policy: self.policy.clone(),
        }
    }
}

impl<B> OrderFlowApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers, clock: Arc::new(SystemClock), policy: SplitPolicy::default() }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_policy(mut self, policy: SplitPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut B {
        &mut self.db
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn policy(&self) -> &SplitPolicy {
        &self.policy
    }
}

impl<B> OrderFlowApi<B>
where B: MarketplaceDatabase
{
    /// Validates a checkout, splits it by seller and persists it, reserving stock for every line.
    ///
    /// Nothing is written if any line fails to resolve, is out of stock, or belongs to a seller whose commission rate
    /// is out of bounds.
    pub async fn create_order(&self, checkout: Checkout) -> Result<Order, MarketplaceError> {
        let checkout = validate_checkout(checkout)?;
        let order = retry_on_conflict("Checkout", || {
            let checkout = checkout.clone();
            async move { self.db.insert_split_order(checkout, &self.policy, self.clock.now()).await }
        })
        .await?;
        info!(
            "🔄️📦️ Order {} created for {}. {} item(s) across {} seller(s), total {} {}",
            order.id,
            order.buyer_id,
            order.item_count(),
            order.sub_orders.len(),
            order.total_price,
            order.currency
        );
        if !self.producers.order_created_producer.is_empty() {
            let sub_orders = self.db.fetch_sub_orders_for_order(order.id).await?;
            for producer in &self.producers.order_created_producer {
                let event = OrderCreatedEvent { order: order.clone(), sub_orders: sub_orders.clone() };
                producer.publish_event(event).await;
            }
        }
        Ok(order)
    }

    async fn fetch_order_or_fail(&self, id: OrderId) -> Result<Order, MarketplaceError> {
        self.db.fetch_order(id).await?.ok_or(MarketplaceError::OrderNotFound(id))
    }

    async fn fetch_sub_order_or_fail(&self, id: SubOrderId) -> Result<SubOrder, MarketplaceError> {
        self.db.fetch_sub_order(id).await?.ok_or(MarketplaceError::SubOrderNotFound(id))
    }

    /// Moves a master order to `new_status` on behalf of an admin.
    ///
    /// * Terminal orders are locked.
    /// * Multi-seller orders cannot move to a fulfillment status until every seller has approved or declined their
    ///   sub-order, even once payment has advanced them to `processing`.
    /// * Every sub-order that is behind the master moves with it. Delivery releases seller earnings.
    /// * Sub-orders their sellers declined are cancelled, and their stock restored, by the first fulfillment move.
    /// * Cancelling restores stock for every sub-order that is cancelled along with the master.
    pub async fn update_order_status(&self, id: OrderId, new_status: OrderStatus) -> Result<Order, MarketplaceError> {
        if new_status == OrderStatus::Cancelled {
            return self.cancel_as(id, &Actor::Admin, "Cancelled by an administrator").await;
        }
        let transition = retry_on_conflict("Order status update", || async move {
            let order = self.fetch_order_or_fail(id).await?;
            check_order_transition(order.order_status, new_status)?;
            if order.is_master_order {
                let sub_orders = self.db.fetch_sub_orders_for_order(id).await?;
                check_approval_gate(&order, &sub_orders, new_status)?;
            }
            self.db.update_order_status(&order, new_status, self.clock.now()).await
        })
        .await?;
        info!("🔄️📦️ Order {id} is now {new_status}");
        self.call_earnings_released_hook(&transition.affected_sub_orders).await;
        Ok(transition.order)
    }

    /// Cancels an order on behalf of its buyer. Buyers may only cancel before the order ships.
    pub async fn cancel_order(&self, id: OrderId, buyer_id: &str) -> Result<Order, MarketplaceError> {
        self.cancel_as(id, &Actor::Buyer(buyer_id.to_string()), "Cancelled by the buyer").await
    }

    async fn cancel_as(&self, id: OrderId, actor: &Actor, reason: &str) -> Result<Order, MarketplaceError> {
        let transition = retry_on_conflict("Order cancellation", || async move {
            let order = self.fetch_order_or_fail(id).await?;
            check_cancellation(&order, actor)?;
            self.db.update_order_status(&order, OrderStatus::Cancelled, self.clock.now()).await
        })
        .await?;
        info!("🔄️❌️ Order {id} cancelled. {reason}");
        self.call_order_annulled_hook(&transition.order, reason).await;
        Ok(transition.order)
    }

    /// Moves one seller's sub-order to `new_status`. When `acting_seller_id` is given, it must own the sub-order.
    pub async fn update_sub_order_status(
        &self,
        id: SubOrderId,
        new_status: OrderStatus,
        acting_seller_id: Option<&str>,
    ) -> Result<SubOrder, MarketplaceError> {
        let actor = acting_seller_id.map(|s| Actor::Seller(s.to_string())).unwrap_or(Actor::Admin);
        let actor = &actor;
        let sub_order = retry_on_conflict("Sub-order status update", || async move {
            let sub_order = self.fetch_sub_order_or_fail(id).await?;
            check_sub_order_owner(&sub_order, actor)?;
            check_order_transition(sub_order.order_status, new_status)?;
            check_declined_sub_order(&sub_order, new_status)?;
            self.db.update_sub_order_status(&sub_order, new_status, self.clock.now()).await
        })
        .await?;
        info!("🔄️📦️ Sub-order {id} of order {} is now {new_status}", sub_order.master_order_id);
        self.call_earnings_released_hook(std::slice::from_ref(&sub_order)).await;
        Ok(sub_order)
    }

    /// Records the seller's decision on their part of a multi-seller order. The decision is final.
    pub async fn update_seller_approval(
        &self,
        id: SubOrderId,
        status: SellerApprovalStatus,
    ) -> Result<SubOrder, MarketplaceError> {
        let sub_order = retry_on_conflict("Seller approval", || async move {
            let sub_order = self.fetch_sub_order_or_fail(id).await?;
            check_approval_transition(sub_order.seller_approval_status, status)?;
            self.db.update_seller_approval(&sub_order, status, self.clock.now()).await
        })
        .await?;
        info!("🔄️✅️ Seller {} set sub-order {id} to {status}", sub_order.seller_id);
        Ok(sub_order)
    }

    /// Changes the payment status of an order, mirroring it onto the sub-orders.
    ///
    /// | From \ To | Paid | Failed | Refunded |
    /// |-----------|------|--------|----------|
    /// | Pending   | 1    | ok     | Err      |
    /// | Paid      | Err  | Err    | 2        |
    /// | Failed    | Err  | Err    | Err      |
    /// | Refunded  | Err  | Err    | Err      |
    ///
    /// 1. Card payments must carry the processor's payment result. A pending order (and its pending sub-orders)
    ///    advances to `processing`. A payment that arrives after the order was cancelled is recorded, but the order
    ///    stays cancelled so that it can be refunded.
    /// 2. Only cancelled orders can be refunded.
    pub async fn update_payment_status(
        &self,
        id: OrderId,
        status: PaymentStatus,
        payment_result: Option<PaymentResult>,
    ) -> Result<Order, MarketplaceError> {
        let change = PaymentChange { status, payment_result, refund_result: None };
        self.apply_payment_change(id, change).await
    }

    /// Records a completed refund against a cancelled, paid order.
    pub async fn record_refund(&self, id: OrderId, refund: RefundResult) -> Result<Order, MarketplaceError> {
        self.apply_payment_change(id, PaymentChange::refunded(refund)).await
    }

    async fn apply_payment_change(&self, id: OrderId, change: PaymentChange) -> Result<Order, MarketplaceError> {
        let change = &change;
        let transition = retry_on_conflict("Payment status update", || async move {
            let order = self.fetch_order_or_fail(id).await?;
            check_payment_change(&order, change)?;
            self.db.update_payment_status(&order, change.clone(), self.clock.now()).await
        })
        .await?;
        let OrderTransition { order, .. } = transition;
        match change.status {
            PaymentStatus::Paid => {
                info!("🔄️💳️ Order {id} has been paid. Fulfillment can begin");
                self.call_order_paid_hook(&order).await;
            },
            PaymentStatus::Refunded => {
                info!("🔄️💳️ Order {id} has been refunded");
                if let Some(refund) = &order.refund_result {
                    self.call_order_refunded_hook(&order, refund).await;
                }
            },
            status => info!("🔄️💳️ Order {id} payment is now {status}"),
        }
        Ok(order)
    }

    /// Cancels every unpaid card order that has been pending for longer than `threshold`, returning its stock.
    ///
    /// Orders are handled one at a time. A failure is logged and counted but does not stop the run, and an order that
    /// was paid or cancelled while the run was in progress is skipped. Running this twice in a row cancels each stale
    /// order once.
    pub async fn cancel_stale_orders(&self, threshold: Duration) -> Result<StaleOrderReport, MarketplaceError> {
        let cutoff = self.clock.now() - threshold;
        let candidates = self.db.fetch_stale_orders(cutoff).await?;
        let mut report = StaleOrderReport { total_candidates: candidates.len(), ..Default::default() };
        for candidate in candidates {
            match self.cancel_stale_order(candidate.id, threshold).await {
                Ok(Some(order)) => {
                    report.cancelled += 1;
                    self.call_order_annulled_hook(&order, "Payment was not received in time").await;
                },
                Ok(None) => report.skipped += 1,
                Err(e) => {
                    report.failed += 1;
                    warn!("🔄️🕰️ Could not cancel stale order {}. {e}", candidate.id);
                },
            }
        }
        if report.total_candidates > 0 {
            info!("🔄️🕰️ Stale order run complete. {report}");
        } else {
            debug!("🔄️🕰️ Stale order run complete. No candidates");
        }
        Ok(report)
    }

    /// Cancels the order if it is still stale when re-read. Returns `None` if it no longer qualifies.
    async fn cancel_stale_order(&self, id: OrderId, threshold: Duration) -> Result<Option<Order>, MarketplaceError> {
        retry_on_conflict("Stale order cancellation", || async move {
            let now = self.clock.now();
            let order = self.fetch_order_or_fail(id).await?;
            let still_stale = order.payment_method == PaymentMethod::Card &&
                order.payment_status == PaymentStatus::Pending &&
                order.order_status == OrderStatus::Pending &&
                order.created_at < now - threshold;
            if !still_stale {
                debug!("🔄️🕰️ Order {id} is no longer stale. Skipping");
                return Ok(None);
            }
            check_cancellation(&order, &Actor::System)?;
            let transition = self.db.update_order_status(&order, OrderStatus::Cancelled, now).await?;
            info!("🔄️🕰️ Stale order {id} cancelled and {} item(s) returned to stock", order.item_count());
            Ok(Some(transition.order))
        })
        .await
    }

    pub async fn fetch_order(&self, id: OrderId) -> Result<Option<Order>, MarketplaceError> {
        self.db.fetch_order(id).await
    }

    pub async fn fetch_sub_order(&self, id: SubOrderId) -> Result<Option<SubOrder>, MarketplaceError> {
        self.db.fetch_sub_order(id).await
    }

    pub async fn fetch_sub_orders_for_order(&self, id: OrderId) -> Result<Vec<SubOrder>, MarketplaceError> {
        self.db.fetch_sub_orders_for_order(id).await
    }

    pub async fn fetch_orders_for_buyer(&self, buyer_id: &str) -> Result<Vec<Order>, MarketplaceError> {
        self.db.fetch_orders_for_buyer(buyer_id).await
    }

    /// Sub-orders fulfilled by `seller_id`, further narrowed by `filter`.
    pub async fn fetch_sub_orders_for_seller(
        &self,
        seller_id: &str,
        filter: SubOrderQueryFilter,
    ) -> Result<Vec<SubOrder>, MarketplaceError> {
        self.db.search_sub_orders(filter.with_seller_id(seller_id)).await
    }

    async fn call_order_paid_hook(&self, order: &Order) {
        for emitter in &self.producers.order_paid_producer {
            debug!("🔄️💳️ Notifying order paid hook subscribers");
            emitter.publish_event(OrderPaidEvent::new(order.clone())).await;
        }
    }

    async fn call_order_annulled_hook(&self, order: &Order, reason: &str) {
        for emitter in &self.producers.order_annulled_producer {
            debug!("🔄️❌️ Notifying order annulled hook subscribers");
            emitter.publish_event(OrderAnnulledEvent::new(order.clone(), reason)).await;
        }
    }

    async fn call_order_refunded_hook(&self, order: &Order, refund: &RefundResult) {
        for emitter in &self.producers.order_refunded_producer {
            debug!("🔄️💳️ Notifying order refunded hook subscribers");
            emitter.publish_event(OrderRefundedEvent { order: order.clone(), refund: refund.clone() }).await;
        }
    }

    async fn call_earnings_released_hook(&self, sub_orders: &[SubOrder]) {
        let released = sub_orders.iter().filter(|s| s.order_status == OrderStatus::Delivered && s.earnings_released);
        for sub_order in released {
            info!(
                "🔄️💰️ {} in earnings released to seller {} for sub-order {}",
                sub_order.seller_earnings, sub_order.seller_id, sub_order.id
            );
            for emitter in &self.producers.earnings_released_producer {
                emitter.publish_event(EarningsReleasedEvent { sub_order: sub_order.clone() }).await;
            }
        }
    }
}

fn check_payment_change(order: &Order, change: &PaymentChange) -> Result<(), MarketplaceError> {
    if change.status == PaymentStatus::Refunded && order.payment_status == PaymentStatus::Refunded {
        return Err(MarketplaceError::AlreadyRefunded(order.id));
    }
    check_payment_transition(order.payment_status, change.status)?;
    match change.status {
        PaymentStatus::Paid if order.payment_method == PaymentMethod::Card && change.payment_result.is_none() => {
            Err(MarketplaceError::ValidationError(format!(
                "Card payment for order {} requires the processor's payment result",
                order.id
            )))
        },
        PaymentStatus::Refunded if order.order_status != OrderStatus::Cancelled => {
            Err(MarketplaceError::RefundNotEligible(format!(
                "Order {} is {}. Only cancelled orders can be refunded",
                order.id, order.order_status
            )))
        },
        _ => Ok(()),
    }
}
