use chrono::{DateTime, Utc};
use mkt_common::Money;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{db_types::OrderId, traits::MarketplaceError};

#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct ProcessorError(pub String);

impl From<ProcessorError> for MarketplaceError {
    fn from(e: ProcessorError) -> Self {
        Self::PaymentProcessorError(e.0)
    }
}

/// What the buyer's client needs to complete an in-page card payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentSecret {
    pub intent_id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSessionRequest {
    pub order_id: OrderId,
    pub line_item_name: String,
    pub amount: Money,
    pub currency: String,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSessionInfo {
    pub session_id: String,
    /// The hosted payment page to redirect the buyer to
    pub url: Option<String>,
}

/// The processor's view of a payment intent. Retrieving it has no side effects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentConfirmation {
    pub intent_id: String,
    pub status: String,
    pub succeeded: bool,
    pub amount: Money,
    pub currency: String,
    pub order_id: Option<OrderId>,
    pub receipt_email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorRefund {
    pub refund_id: String,
    pub charge_id: Option<String>,
    pub amount: Money,
    pub currency: String,
}

/// Processor callbacks, normalised to the events the engine acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessorEvent {
    CheckoutSessionCompleted {
        session_id: String,
        payment_intent: Option<String>,
        paid: bool,
        order_id: Option<OrderId>,
        email: Option<String>,
        created: DateTime<Utc>,
    },
    PaymentIntentSucceeded {
        intent_id: String,
        order_id: Option<OrderId>,
        email: Option<String>,
        created: DateTime<Utc>,
    },
    PaymentIntentFailed {
        intent_id: String,
        order_id: Option<OrderId>,
    },
    /// Anything else. Acknowledged and ignored.
    Other { event_type: String },
}

/// The card processor, as seen by the settlement engine.
#[allow(async_fn_in_trait)]
pub trait PaymentProcessor {
    async fn create_intent(
        &self,
        amount: Money,
        currency: &str,
        metadata: &[(&str, &str)],
    ) -> Result<IntentSecret, ProcessorError>;

    async fn create_checkout_session(
        &self,
        request: CheckoutSessionRequest,
    ) -> Result<CheckoutSessionInfo, ProcessorError>;

    async fn retrieve_intent(&self, intent_id: &str) -> Result<PaymentConfirmation, ProcessorError>;

    /// The payment intent behind a checkout session, once the buyer has paid.
    async fn resolve_session_intent(&self, session_id: &str) -> Result<Option<String>, ProcessorError>;

    /// Refunds `amount`, or the full charge when `None`. Repeating a call with the same `idempotency_key` must not
    /// issue a second refund.
    async fn refund(
        &self,
        intent_id: &str,
        amount: Option<Money>,
        idempotency_key: &str,
    ) -> Result<ProcessorRefund, ProcessorError>;
}
