use std::sync::Arc;

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION},
    Client,
    Method,
};
use serde::{de::DeserializeOwned, Deserialize};

use crate::{
    config::StripeConfig,
    data_objects::{CheckoutSession, NewCheckoutSession, PaymentIntent, Refund},
    helpers::metadata_params,
    StripeApiError,
};

#[derive(Clone)]
pub struct StripeApi {
    config: StripeConfig,
    client: Arc<Client>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    code: Option<String>,
}

impl StripeApi {
    pub fn new(config: StripeConfig) -> Result<Self, StripeApiError> {
        let mut headers = HeaderMap::with_capacity(2);
        let val = HeaderValue::from_str(&format!("Bearer {}", config.secret_key.reveal()))
            .map_err(|e| StripeApiError::Initialization(e.to_string()))?;
        headers.insert(AUTHORIZATION, val);
        headers.insert("Stripe-Version", HeaderValue::from_static("2024-06-20"));
        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| StripeApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn config(&self) -> &StripeConfig {
        &self.config
    }

    /// Sends a form-encoded request to the processor. `idempotency_key` is forwarded as the `Idempotency-Key` header,
    /// which makes retried POSTs return the original result instead of repeating the side effect.
    pub async fn rest_query<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        params: &[(String, String)],
        idempotency_key: Option<&str>,
    ) -> Result<T, StripeApiError> {
        let url = self.url(path);
        trace!("💳️ Sending REST query: {method} {url}");
        let mut req = self.client.request(method.clone(), url);
        if !params.is_empty() {
            req = if method == Method::GET { req.query(params) } else { req.form(params) };
        }
        if let Some(key) = idempotency_key {
            req = req.header("Idempotency-Key", key);
        }
        let response = req.send().await.map_err(|e| StripeApiError::RestRequestError(e.to_string()))?;
        if response.status().is_success() {
            trace!("💳️ REST query successful. {}", response.status());
            response.json::<T>().await.map_err(|e| StripeApiError::JsonError(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let body = response.text().await.map_err(|e| StripeApiError::RestResponseError(e.to_string()))?;
            let message = match serde_json::from_str::<ErrorResponse>(&body) {
                Ok(ErrorResponse { error: ErrorBody { message, code } }) => {
                    let code = code.unwrap_or_else(|| "unknown".to_string());
                    format!("[{code}] {}", message.unwrap_or_default())
                },
                Err(_) => body,
            };
            Err(StripeApiError::QueryError { status, message })
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.api_url.trim_end_matches('/'))
    }

    pub async fn create_payment_intent(
        &self,
        amount: i64,
        currency: &str,
        metadata: &[(&str, &str)],
    ) -> Result<PaymentIntent, StripeApiError> {
        if amount <= 0 {
            return Err(StripeApiError::InvalidCurrencyAmount(format!("Intent amount must be positive, not {amount}")));
        }
        let mut params = vec![
            ("amount".to_string(), amount.to_string()),
            ("currency".to_string(), currency.to_string()),
            ("automatic_payment_methods[enabled]".to_string(), "true".to_string()),
        ];
        params.extend(metadata_params("metadata", metadata));
        debug!("💳️ Creating payment intent for {amount} {currency}");
        let intent = self.rest_query::<PaymentIntent>(Method::POST, "/payment_intents", &params, None).await?;
        info!("💳️ Created payment intent {}", intent.id);
        Ok(intent)
    }

    pub async fn retrieve_payment_intent(&self, id: &str) -> Result<PaymentIntent, StripeApiError> {
        let path = format!("/payment_intents/{id}");
        debug!("💳️ Fetching payment intent {id}");
        self.rest_query::<PaymentIntent>(Method::GET, &path, &[], None).await
    }

    pub async fn create_checkout_session(&self, session: &NewCheckoutSession) -> Result<CheckoutSession, StripeApiError> {
        let params = session.to_form_params()?;
        debug!("💳️ Creating checkout session: {}", session.line_item_name);
        let result = self.rest_query::<CheckoutSession>(Method::POST, "/checkout/sessions", &params, None).await?;
        info!("💳️ Created checkout session {}", result.id);
        Ok(result)
    }

    pub async fn retrieve_checkout_session(&self, id: &str) -> Result<CheckoutSession, StripeApiError> {
        let path = format!("/checkout/sessions/{id}");
        debug!("💳️ Fetching checkout session {id}");
        self.rest_query::<CheckoutSession>(Method::GET, &path, &[], None).await
    }

    /// Refunds a payment intent, in full when `amount` is `None`.
    pub async fn create_refund(
        &self,
        payment_intent: &str,
        amount: Option<i64>,
        idempotency_key: Option<&str>,
    ) -> Result<Refund, StripeApiError> {
        let mut params = vec![("payment_intent".to_string(), payment_intent.to_string())];
        if let Some(amount) = amount {
            if amount <= 0 {
                return Err(StripeApiError::InvalidCurrencyAmount(format!(
                    "Refund amount must be positive, not {amount}"
                )));
            }
            params.push(("amount".to_string(), amount.to_string()));
        }
        debug!("💳️ Refunding payment intent {payment_intent}");
        let refund = self.rest_query::<Refund>(Method::POST, "/refunds", &params, idempotency_key).await?;
        info!("💳️ Refund {} issued for {} ({})", refund.id, payment_intent, refund.amount);
        Ok(refund)
    }
}
