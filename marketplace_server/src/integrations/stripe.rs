use chrono::{DateTime, Utc};
use log::*;
use marketplace_engine::{
    db_types::OrderId,
    traits::{
        CheckoutSessionInfo,
        CheckoutSessionRequest,
        IntentSecret,
        PaymentConfirmation,
        PaymentProcessor,
        ProcessorError,
        ProcessorEvent,
        ProcessorRefund,
    },
};
use mkt_common::Money;
use stripe_tools::{IntentStatus, NewCheckoutSession, StripeApi, StripeApiError, StripeEvent};

/// The metadata key that ties processor objects to marketplace orders.
pub const ORDER_ID_KEY: &str = "order_id";

/// [`PaymentProcessor`] backed by the Stripe REST API.
#[derive(Clone)]
pub struct StripeProcessor {
    api: StripeApi,
}

impl StripeProcessor {
    pub fn new(api: StripeApi) -> Self {
        Self { api }
    }
}

fn processor_error(e: StripeApiError) -> ProcessorError {
    ProcessorError(e.to_string())
}

impl PaymentProcessor for StripeProcessor {
    async fn create_intent(
        &self,
        amount: Money,
        currency: &str,
        metadata: &[(&str, &str)],
    ) -> Result<IntentSecret, ProcessorError> {
        let intent = self.api.create_payment_intent(amount.value(), currency, metadata).await.map_err(processor_error)?;
        let client_secret = intent
            .client_secret
            .ok_or_else(|| ProcessorError(format!("Payment intent {} was returned without a client secret", intent.id)))?;
        Ok(IntentSecret { intent_id: intent.id, client_secret })
    }

    async fn create_checkout_session(
        &self,
        request: CheckoutSessionRequest,
    ) -> Result<CheckoutSessionInfo, ProcessorError> {
        let session = NewCheckoutSession::new(request.line_item_name, request.amount.value(), request.currency)
            .with_urls(request.success_url, request.cancel_url)
            .with_metadata(ORDER_ID_KEY, request.order_id.value().to_string());
        let session = self.api.create_checkout_session(&session).await.map_err(processor_error)?;
        Ok(CheckoutSessionInfo { session_id: session.id, url: session.url })
    }

    async fn retrieve_intent(&self, intent_id: &str) -> Result<PaymentConfirmation, ProcessorError> {
        let intent = self.api.retrieve_payment_intent(intent_id).await.map_err(processor_error)?;
        let order_id = intent.metadata.get(ORDER_ID_KEY).and_then(|s| parse_order_id(s));
        Ok(PaymentConfirmation {
            succeeded: intent.status == IntentStatus::Succeeded,
            status: intent.status.as_str().to_string(),
            intent_id: intent.id,
            amount: Money::from(intent.amount),
            currency: intent.currency,
            order_id,
            receipt_email: intent.receipt_email,
        })
    }

    async fn resolve_session_intent(&self, session_id: &str) -> Result<Option<String>, ProcessorError> {
        let session = self.api.retrieve_checkout_session(session_id).await.map_err(processor_error)?;
        Ok(session.payment_intent)
    }

    async fn refund(
        &self,
        intent_id: &str,
        amount: Option<Money>,
        idempotency_key: &str,
    ) -> Result<ProcessorRefund, ProcessorError> {
        let refund = self
            .api
            .create_refund(intent_id, amount.map(|a| a.value()), Some(idempotency_key))
            .await
            .map_err(processor_error)?;
        Ok(ProcessorRefund {
            refund_id: refund.id,
            charge_id: refund.charge,
            amount: Money::from(refund.amount),
            currency: refund.currency,
        })
    }
}

fn parse_order_id(s: &str) -> Option<OrderId> {
    s.parse::<OrderId>().map_err(|e| warn!("💳️ Ignoring unusable order id in processor metadata. {e}")).ok()
}

fn timestamp(secs: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(secs, 0).unwrap_or_else(Utc::now)
}

/// Normalises a (signature-checked) Stripe event into the event the engine acts on.
pub fn processor_event_from(event: &StripeEvent) -> Result<ProcessorEvent, StripeApiError> {
    let result = match event.event_type.as_str() {
        "checkout.session.completed" | "checkout.session.async_payment_succeeded" => {
            let session = event.checkout_session()?;
            ProcessorEvent::CheckoutSessionCompleted {
                paid: session.is_paid(),
                order_id: session.metadata.get(ORDER_ID_KEY).and_then(|s| parse_order_id(s)),
                session_id: session.id,
                payment_intent: session.payment_intent,
                email: session.customer_email,
                created: timestamp(event.created),
            }
        },
        "payment_intent.succeeded" => {
            let intent = event.payment_intent()?;
            ProcessorEvent::PaymentIntentSucceeded {
                order_id: intent.metadata.get(ORDER_ID_KEY).and_then(|s| parse_order_id(s)),
                intent_id: intent.id,
                email: intent.receipt_email,
                created: timestamp(event.created),
            }
        },
        "payment_intent.payment_failed" => {
            let intent = event.payment_intent()?;
            ProcessorEvent::PaymentIntentFailed {
                order_id: intent.metadata.get(ORDER_ID_KEY).and_then(|s| parse_order_id(s)),
                intent_id: intent.id,
            }
        },
        other => ProcessorEvent::Other { event_type: other.to_string() },
    };
    Ok(result)
}
