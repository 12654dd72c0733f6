//! # Stripe tools
//!
//! A thin client for the card processor's REST API, covering the calls the marketplace needs for settlement:
//! payment intents, hosted checkout sessions and refunds. Webhook payloads can be authenticated with
//! [`verify_webhook_signature`].
mod api;
mod config;
mod error;
mod webhook;

mod data_objects;
pub mod helpers;

pub use api::StripeApi;
pub use config::StripeConfig;
pub use data_objects::{
    CheckoutSession,
    CheckoutSessionStatus,
    IntentStatus,
    NewCheckoutSession,
    PaymentIntent,
    Refund,
    StripeEvent,
    StripeEventData,
};
pub use error::{StripeApiError, WebhookError};
pub use webhook::{compute_signature, verify_webhook_signature, verify_webhook_signature_at, SIGNATURE_TOLERANCE_SECS};
