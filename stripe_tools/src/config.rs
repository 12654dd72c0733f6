use log::*;
use mkt_common::Secret;

pub const DEFAULT_STRIPE_API_URL: &str = "https://api.stripe.com/v1";

#[derive(Debug, Clone, Default)]
pub struct StripeConfig {
    /// Base url for REST calls. Overridable so that tests and staging can point at a mock processor.
    pub api_url: String,
    pub secret_key: Secret<String>,
    pub publishable_key: String,
    /// The signing secret for webhook deliveries (`whsec_...`)
    pub webhook_secret: Secret<String>,
}

impl StripeConfig {
    pub fn new_from_env_or_default() -> Self {
        let api_url = std::env::var("MKT_STRIPE_API_URL").unwrap_or_else(|_| {
            debug!("MKT_STRIPE_API_URL not set, using {DEFAULT_STRIPE_API_URL}");
            DEFAULT_STRIPE_API_URL.to_string()
        });
        let secret_key = Secret::new(std::env::var("MKT_STRIPE_SECRET_KEY").unwrap_or_else(|_| {
            warn!("MKT_STRIPE_SECRET_KEY not set, using (probably useless) default");
            "sk_test_00000000000000".to_string()
        }));
        let publishable_key = std::env::var("MKT_STRIPE_PUBLISHABLE_KEY").unwrap_or_else(|_| {
            warn!("MKT_STRIPE_PUBLISHABLE_KEY not set, using (probably useless) default");
            "pk_test_00000000000000".to_string()
        });
        let webhook_secret = Secret::new(std::env::var("MKT_STRIPE_WEBHOOK_SECRET").unwrap_or_else(|_| {
            warn!("MKT_STRIPE_WEBHOOK_SECRET not set. Webhook deliveries will fail signature checks.");
            String::default()
        }));
        Self { api_url, secret_key, publishable_key, webhook_secret }
    }
}
