//! # Marketplace engine public API
//!
//! The APIs are modular, so that clients pick the functionality they need. Each is created by supplying a backend
//! that implements the traits it requires.
//!
//! * [`order_flow_api`] covers the order lifecycle: checkout, status changes, seller approval, payment status and
//!   stale order reconciliation.
//! * [`payment_api`] binds a card processor to the order lifecycle.
//! * [`earnings_api`] reports seller earnings and platform commission.
//!
//! ```rust,ignore
//! use marketplace_engine::{events::EventProducers, OrderFlowApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url(...).await?;
//! let api = OrderFlowApi::new(db, EventProducers::default());
//! let order = api.create_order(checkout).await?;
//! ```
pub mod earnings_api;
pub mod order_flow_api;
pub mod order_objects;
pub mod payment_api;
