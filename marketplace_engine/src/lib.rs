//! Marketplace Engine
//!
//! The order splitting and settlement engine of a multi-vendor marketplace. A buyer checks out once, with items from
//! any number of sellers; the engine splits that checkout into one sub-order per seller, computes the platform's
//! commission and each seller's earnings, and governs how orders, sub-orders, payments and seller approvals move
//! through their lifecycles.
//!
//! The library is divided into:
//! 1. Pure business rules: [`mod@commission`], [`mod@order_splitter`] and [`mod@state_machine`].
//! 2. Storage. The backend contracts live in [`mod@traits`], and [`SqliteDatabase`] implements them. Data types are in
//!    [`mod@db_types`].
//! 3. The public APIs: [`OrderFlowApi`], [`PaymentApi`] and [`EarningsApi`].
//!
//! The engine also emits events (order created, paid, annulled, refunded and earnings released) that can be
//! subscribed to through [`mod@events`].
pub mod commission;
pub mod db_types;
pub mod events;
pub mod helpers;
mod mkt_api;
pub mod order_splitter;
pub mod state_machine;
pub mod traits;

#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use mkt_api::{
    earnings_api::EarningsApi,
    order_flow_api::OrderFlowApi,
    order_objects,
    payment_api::PaymentApi,
};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use traits::{
    CatalogManagement,
    EarningsReporting,
    MarketplaceDatabase,
    MarketplaceError,
    PaymentProcessor,
};
