//! # Backend contracts
//!
//! The engine's APIs are generic over the traits defined here, so that storage and the card processor can be swapped
//! out (or mocked) without touching the business rules.
//!
//! * [`MarketplaceDatabase`] is the transactional store for orders and sub-orders. Every mutation is a versioned,
//!   conditional update.
//! * [`CatalogManagement`] reads (and seeds) products and sellers.
//! * [`EarningsReporting`] aggregates commission and earnings figures.
//! * [`PaymentProcessor`] talks to the external card processor.
mod catalog_management;
mod earnings_reporting;
mod marketplace_database;
mod payment_processor;

pub mod data_objects;

pub use catalog_management::CatalogManagement;
pub use data_objects::{DateRange, EarningsSummary, OrderTransition, PaymentChange, SellerCommission};
pub use earnings_reporting::EarningsReporting;
pub use marketplace_database::{MarketplaceDatabase, MarketplaceError};
pub use payment_processor::{
    CheckoutSessionInfo,
    CheckoutSessionRequest,
    IntentSecret,
    PaymentConfirmation,
    PaymentProcessor,
    ProcessorError,
    ProcessorEvent,
    ProcessorRefund,
};
