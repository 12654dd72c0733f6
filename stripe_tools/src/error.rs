use thiserror::Error;

#[derive(Debug, Error)]
pub enum StripeApiError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("Invalid REST request: {0}")]
    RestRequestError(String),
    #[error("Invalid REST response: {0}")]
    RestResponseError(String),
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
    #[error("Query failed. Error {status}. {message}")]
    QueryError { status: u16, message: String },
    #[error("Invalid currency amount: {0}")]
    InvalidCurrencyAmount(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WebhookError {
    #[error("The signature header is missing a timestamp or a v1 signature")]
    MalformedHeader,
    #[error("The signature header timestamp is not a number")]
    InvalidTimestamp,
    #[error("The webhook timestamp is outside the allowed tolerance")]
    TimestampOutOfTolerance,
    #[error("The webhook signature does not match the payload")]
    SignatureMismatch,
}
