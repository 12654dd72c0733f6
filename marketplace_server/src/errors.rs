use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use log::error;
use marketplace_engine::MarketplaceError;
use stripe_tools::{StripeApiError, WebhookError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Payload deserialization error. {0}")]
    CouldNotDeserializePayload(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("Webhook signature rejected. {0}")]
    InvalidSignature(#[from] WebhookError),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("Insufficient Permissions. {0}")]
    InsufficientPermissions(String),
    #[error("The request conflicts with the current state of the record. {0}")]
    Conflict(String),
    #[error("The payment processor could not complete the request. {0}")]
    PaymentProcessorError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::CouldNotDeserializePayload(_) => StatusCode::BAD_REQUEST,
            Self::InvalidSignature(_) => StatusCode::BAD_REQUEST,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::PaymentProcessorError(_) => StatusCode::BAD_GATEWAY,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

impl From<MarketplaceError> for ServerError {
    fn from(e: MarketplaceError) -> Self {
        match e {
            MarketplaceError::DatabaseError(msg) => {
                error!("🗃️ Database error: {msg}");
                Self::BackendError("A storage error occurred. The details have been logged.".into())
            },
            MarketplaceError::OrderNotFound(_)
            | MarketplaceError::SubOrderNotFound(_)
            | MarketplaceError::ProductNotFound(_)
            | MarketplaceError::SellerNotFound(_) => Self::NoRecordFound(e.to_string()),
            MarketplaceError::Forbidden(_) => Self::InsufficientPermissions(e.to_string()),
            MarketplaceError::OrderLocked(_)
            | MarketplaceError::PendingSellerApproval(_)
            | MarketplaceError::InvalidStatusTransition { .. }
            | MarketplaceError::InvalidPaymentTransition { .. }
            | MarketplaceError::InvalidApprovalTransition { .. }
            | MarketplaceError::OutOfStock { .. }
            | MarketplaceError::InsufficientStock { .. }
            | MarketplaceError::RefundNotEligible(_)
            | MarketplaceError::AlreadyRefunded(_)
            | MarketplaceError::VersionConflict(_) => Self::Conflict(e.to_string()),
            MarketplaceError::InvalidCommissionRate(_) | MarketplaceError::ValidationError(_) => {
                Self::InvalidRequestBody(e.to_string())
            },
            MarketplaceError::PaymentProcessorError(msg) => Self::PaymentProcessorError(msg),
        }
    }
}

impl From<StripeApiError> for ServerError {
    fn from(e: StripeApiError) -> Self {
        match e {
            StripeApiError::JsonError(msg) => Self::CouldNotDeserializePayload(msg),
            e => Self::PaymentProcessorError(e.to_string()),
        }
    }
}
