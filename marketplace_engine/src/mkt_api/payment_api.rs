use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;
use mkt_common::Money;

use crate::{
    db_types::{Order, OrderId, OrderStatus, PaymentMethod, PaymentResult, PaymentStatus, RefundResult},
    mkt_api::order_flow_api::OrderFlowApi,
    order_objects::ProcessorEventOutcome,
    traits::{
        CheckoutSessionInfo,
        CheckoutSessionRequest,
        IntentSecret,
        MarketplaceDatabase,
        MarketplaceError,
        PaymentConfirmation,
        PaymentProcessor,
        ProcessorEvent,
    },
};

/// Processor references with this prefix are checkout sessions rather than payment intents.
const CHECKOUT_SESSION_PREFIX: &str = "cs_";

/// `PaymentApi` binds the card processor to the order lifecycle.
///
/// It creates payment intents and hosted checkout sessions for orders, issues refunds for cancelled orders, and maps
/// the processor's callbacks onto payment status changes in [`OrderFlowApi`].
pub struct PaymentApi<B, P> {
    flow: OrderFlowApi<B>,
    processor: P,
}

impl<B, P> Debug for PaymentApi<B, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PaymentApi")
    }
}

impl<B: Clone, P: Clone> Clone for PaymentApi<B, P> {
    fn clone(&self) -> Self {
        Self { flow: self.flow.clone(), processor: self.processor.clone() }
    }
}

impl<B, P> PaymentApi<B, P> {
    pub fn new(flow: OrderFlowApi<B>, processor: P) -> Self {
        Self { flow, processor }
    }

    pub fn flow(&self) -> &OrderFlowApi<B> {
        &self.flow
    }

    pub fn processor(&self) -> &P {
        &self.processor
    }
}

impl<B, P> PaymentApi<B, P>
where
    B: MarketplaceDatabase,
    P: PaymentProcessor,
{
    /// Creates a payment intent for an arbitrary amount and returns the secret the buyer's client needs to confirm it.
    pub async fn create_intent(
        &self,
        amount: Money,
        currency: &str,
        metadata: &[(&str, &str)],
    ) -> Result<IntentSecret, MarketplaceError> {
        if !amount.is_positive() {
            return Err(MarketplaceError::ValidationError(format!("Cannot charge a non-positive amount ({amount})")));
        }
        let secret = self.processor.create_intent(amount, currency, metadata).await?;
        debug!("💳️ Payment intent {} created for {amount} {currency}", secret.intent_id);
        Ok(secret)
    }

    /// Creates a payment intent for the full total of an unpaid card order, tagged with the order id.
    pub async fn create_intent_for_order(&self, order_id: OrderId) -> Result<IntentSecret, MarketplaceError> {
        let order = self.payable_order(order_id).await?;
        let id = order.id.value().to_string();
        self.create_intent(order.total_price, &order.currency, &[("order_id", id.as_str())]).await
    }

    /// Creates a hosted checkout session for an unpaid card order.
    ///
    /// The session carries a single line item for the order total, so the buyer is charged exactly what was computed
    /// at checkout, tax and shipping included.
    pub async fn create_checkout_session(
        &self,
        order_id: OrderId,
        success_url: &str,
        cancel_url: &str,
    ) -> Result<CheckoutSessionInfo, MarketplaceError> {
        let order = self.payable_order(order_id).await?;
        let request = CheckoutSessionRequest {
            order_id: order.id,
            line_item_name: format!("Order {} ({} items)", order.id, order.item_count()),
            amount: order.total_price,
            currency: order.currency.clone(),
            success_url: success_url.to_string(),
            cancel_url: cancel_url.to_string(),
        };
        let session = self.processor.create_checkout_session(request).await?;
        info!("💳️ Checkout session {} created for order {order_id}", session.session_id);
        Ok(session)
    }

    /// Queries the processor for the state of a payment intent. Order state is never changed here.
    pub async fn confirm_payment(&self, intent_id: &str) -> Result<PaymentConfirmation, MarketplaceError> {
        let confirmation = self.processor.retrieve_intent(intent_id).await?;
        debug!("💳️ Payment intent {intent_id} is {}", confirmation.status);
        Ok(confirmation)
    }

    /// Refunds a cancelled, paid card order, in full or in part.
    ///
    /// A checkout session reference is first resolved to the payment intent behind it. The processor call is
    /// idempotent per order, so retrying after a failure to record the refund does not refund twice.
    pub async fn refund(&self, order_id: OrderId, amount: Option<Money>) -> Result<Order, MarketplaceError> {
        let order = self.flow.fetch_order(order_id).await?.ok_or(MarketplaceError::OrderNotFound(order_id))?;
        let reference = refund_reference(&order, amount)?;
        let intent_id = if reference.starts_with(CHECKOUT_SESSION_PREFIX) {
            self.processor.resolve_session_intent(&reference).await?.ok_or_else(|| {
                MarketplaceError::RefundNotEligible(format!("Checkout session {reference} has no payment intent"))
            })?
        } else {
            reference
        };
        let idempotency_key = format!("refund-order-{}", order.id.value());
        let refund = self.processor.refund(&intent_id, amount, &idempotency_key).await?;
        info!("💳️ Refund {} of {} {} issued for order {order_id}", refund.refund_id, refund.amount, refund.currency);
        let result = RefundResult {
            refund_id: refund.refund_id,
            charge_id: refund.charge_id.unwrap_or(intent_id),
            amount: refund.amount,
            currency: refund.currency,
            refunded_at: self.flow.clock().now(),
        };
        self.flow.record_refund(order_id, result.clone()).await.map_err(|e| {
            error!("💳️ Refund {} was issued for order {order_id}, but could not be recorded. {e}", result.refund_id);
            e
        })
    }

    /// Applies a processor callback to the order it refers to.
    ///
    /// Events for unknown orders, unpaid sessions and orders whose payment is already settled are acknowledged and
    /// ignored, so replayed callbacks are harmless.
    pub async fn handle_processor_event(
        &self,
        event: ProcessorEvent,
    ) -> Result<ProcessorEventOutcome, MarketplaceError> {
        match event {
            ProcessorEvent::CheckoutSessionCompleted { session_id, payment_intent, paid, order_id, email, created } => {
                if !paid {
                    return Ok(ignored(format!("Checkout session {session_id} completed without payment")));
                }
                let reference = payment_intent.unwrap_or(session_id);
                self.mark_paid(order_id, reference, email, created).await
            },
            ProcessorEvent::PaymentIntentSucceeded { intent_id, order_id, email, created } => {
                self.mark_paid(order_id, intent_id, email, created).await
            },
            ProcessorEvent::PaymentIntentFailed { intent_id, order_id } => {
                let Some(order) = self.pending_order(order_id, &intent_id).await? else {
                    return Ok(ignored(format!("No unpaid order for payment intent {intent_id}")));
                };
                warn!("💳️ Payment intent {intent_id} for order {} failed", order.id);
                let order = self.flow.update_payment_status(order.id, PaymentStatus::Failed, None).await?;
                Ok(ProcessorEventOutcome::Updated(order))
            },
            ProcessorEvent::Other { event_type } => Ok(ignored(format!("Unhandled event type {event_type}"))),
        }
    }

    async fn mark_paid(
        &self,
        order_id: Option<OrderId>,
        reference: String,
        email: Option<String>,
        created: DateTime<Utc>,
    ) -> Result<ProcessorEventOutcome, MarketplaceError> {
        let Some(order) = self.pending_order(order_id, &reference).await? else {
            return Ok(ignored(format!("No unpaid order for payment {reference}")));
        };
        let result = PaymentResult { id: reference, status: "succeeded".into(), update_time: created, email };
        let order = self.flow.update_payment_status(order.id, PaymentStatus::Paid, Some(result)).await?;
        Ok(ProcessorEventOutcome::Updated(order))
    }

    async fn pending_order(
        &self,
        order_id: Option<OrderId>,
        reference: &str,
    ) -> Result<Option<Order>, MarketplaceError> {
        let Some(order_id) = order_id else {
            warn!("💳️ Processor event for {reference} carries no order id");
            return Ok(None);
        };
        match self.flow.fetch_order(order_id).await? {
            Some(order) if order.payment_status == PaymentStatus::Pending => Ok(Some(order)),
            Some(order) => {
                debug!("💳️ Order {order_id} payment is already {}. Event for {reference} ignored", order.payment_status);
                Ok(None)
            },
            None => {
                warn!("💳️ Processor event for {reference} refers to unknown order {order_id}");
                Ok(None)
            },
        }
    }

    async fn payable_order(&self, order_id: OrderId) -> Result<Order, MarketplaceError> {
        let order = self.flow.fetch_order(order_id).await?.ok_or(MarketplaceError::OrderNotFound(order_id))?;
        if order.payment_method != PaymentMethod::Card {
            return Err(MarketplaceError::ValidationError(format!("Order {order_id} is not paid by card")));
        }
        if order.payment_status != PaymentStatus::Pending || order.order_status == OrderStatus::Cancelled {
            return Err(MarketplaceError::ValidationError(format!(
                "Order {order_id} cannot be paid. Payment is {} and the order is {}",
                order.payment_status, order.order_status
            )));
        }
        Ok(order)
    }
}

fn ignored(reason: String) -> ProcessorEventOutcome {
    debug!("💳️ {reason}");
    ProcessorEventOutcome::Ignored(reason)
}

/// Checks that `order` may be refunded and returns the processor reference of its charge.
fn refund_reference(order: &Order, amount: Option<Money>) -> Result<String, MarketplaceError> {
    if order.payment_status == PaymentStatus::Refunded {
        return Err(MarketplaceError::AlreadyRefunded(order.id));
    }
    let not_eligible = |reason: String| Err(MarketplaceError::RefundNotEligible(reason));
    if order.order_status != OrderStatus::Cancelled {
        return not_eligible(format!("Order {} is {}, not cancelled", order.id, order.order_status));
    }
    if order.payment_status != PaymentStatus::Paid {
        return not_eligible(format!("Order {} payment is {}, not paid", order.id, order.payment_status));
    }
    if order.payment_method != PaymentMethod::Card {
        return not_eligible(format!("Order {} was not paid by card", order.id));
    }
    let Some(payment) = &order.payment_result else {
        return not_eligible(format!("Order {} has no recorded charge", order.id));
    };
    if let Some(amount) = amount {
        if !amount.is_positive() || amount > order.total_price {
            return Err(MarketplaceError::ValidationError(format!(
                "Refund amount {amount} must be positive and at most the order total of {}",
                order.total_price
            )));
        }
    }
    Ok(payment.id.clone())
}
