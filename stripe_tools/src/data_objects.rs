use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{helpers::metadata_params, StripeApiError};

//--------------------------------------    PaymentIntent    ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresAction,
    Processing,
    RequiresCapture,
    Canceled,
    Succeeded,
    #[serde(other)]
    Unknown,
}

impl IntentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RequiresPaymentMethod => "requires_payment_method",
            Self::RequiresConfirmation => "requires_confirmation",
            Self::RequiresAction => "requires_action",
            Self::Processing => "processing",
            Self::RequiresCapture => "requires_capture",
            Self::Canceled => "canceled",
            Self::Succeeded => "succeeded",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PaymentIntent {
    pub id: String,
    /// Amount in the currency's minor unit
    pub amount: i64,
    pub currency: String,
    pub status: IntentStatus,
    pub client_secret: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    pub latest_charge: Option<String>,
    #[serde(default)]
    pub created: i64,
    pub receipt_email: Option<String>,
}

//--------------------------------------   CheckoutSession   ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutSessionStatus {
    Open,
    Complete,
    Expired,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
    pub amount_total: Option<i64>,
    pub currency: Option<String>,
    /// Only populated once the buyer has submitted payment details
    pub payment_intent: Option<String>,
    /// One of `paid`, `unpaid` or `no_payment_required`
    pub payment_status: String,
    pub status: Option<CheckoutSessionStatus>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    pub customer_email: Option<String>,
    #[serde(default)]
    pub created: i64,
}

impl CheckoutSession {
    pub fn is_paid(&self) -> bool {
        self.payment_status == "paid"
    }
}

/// Parameters for a hosted checkout session that charges a single, pre-computed amount.
#[derive(Debug, Clone)]
pub struct NewCheckoutSession {
    pub line_item_name: String,
    /// Unit amount in minor units. The session always has a single line item with a quantity of one.
    pub amount: i64,
    pub currency: String,
    pub success_url: String,
    pub cancel_url: String,
    pub customer_email: Option<String>,
    pub metadata: Vec<(String, String)>,
}

impl NewCheckoutSession {
    pub fn new(line_item_name: impl Into<String>, amount: i64, currency: impl Into<String>) -> Self {
        Self {
            line_item_name: line_item_name.into(),
            amount,
            currency: currency.into(),
            success_url: String::default(),
            cancel_url: String::default(),
            customer_email: None,
            metadata: Vec::new(),
        }
    }

    pub fn with_urls(mut self, success_url: impl Into<String>, cancel_url: impl Into<String>) -> Self {
        self.success_url = success_url.into();
        self.cancel_url = cancel_url.into();
        self
    }

    pub fn with_customer_email<S: Into<String>>(mut self, email: S) -> Self {
        self.customer_email = Some(email.into());
        self
    }

    pub fn with_metadata<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.metadata.push((key.into(), value.into()));
        self
    }

    /// Produces the form-encoded parameters for `POST /checkout/sessions`.
    ///
    /// Metadata is attached to both the session and the underlying payment intent, so that callbacks for either
    /// object can be correlated with the marketplace order.
    pub fn to_form_params(&self) -> Result<Vec<(String, String)>, StripeApiError> {
        if self.amount <= 0 {
            return Err(StripeApiError::InvalidCurrencyAmount(format!(
                "Checkout amount must be positive, not {}",
                self.amount
            )));
        }
        let mut params = vec![
            ("mode".to_string(), "payment".to_string()),
            ("line_items[0][quantity]".to_string(), "1".to_string()),
            ("line_items[0][price_data][currency]".to_string(), self.currency.clone()),
            ("line_items[0][price_data][unit_amount]".to_string(), self.amount.to_string()),
            ("line_items[0][price_data][product_data][name]".to_string(), self.line_item_name.clone()),
            ("success_url".to_string(), self.success_url.clone()),
            ("cancel_url".to_string(), self.cancel_url.clone()),
        ];
        if let Some(email) = &self.customer_email {
            params.push(("customer_email".to_string(), email.clone()));
        }
        let metadata = self.metadata.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect::<Vec<_>>();
        params.extend(metadata_params("metadata", &metadata));
        params.extend(metadata_params("payment_intent_data[metadata]", &metadata));
        Ok(params)
    }
}

//--------------------------------------        Refund       ---------------------------------------------------------
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Refund {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    pub charge: Option<String>,
    pub payment_intent: Option<String>,
    pub status: Option<String>,
    #[serde(default)]
    pub created: i64,
}

//--------------------------------------        Events       ---------------------------------------------------------
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub created: i64,
    pub data: StripeEventData,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeEventData {
    pub object: Value,
}

impl StripeEvent {
    pub fn checkout_session(&self) -> Result<CheckoutSession, StripeApiError> {
        serde_json::from_value(self.data.object.clone()).map_err(|e| StripeApiError::JsonError(e.to_string()))
    }

    pub fn payment_intent(&self) -> Result<PaymentIntent, StripeApiError> {
        serde_json::from_value(self.data.object.clone()).map_err(|e| StripeApiError::JsonError(e.to_string()))
    }
}
