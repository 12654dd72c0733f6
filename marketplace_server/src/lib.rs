//! # Marketplace server
//! The process that hosts the settlement engine. It is responsible for:
//! * Loading configuration from the environment.
//! * Owning the database handle, the engine event handlers and the stale order worker (see [`lifecycle`]).
//! * Receiving card processor callbacks and handing them to the engine.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/processor/webhook`: Signed payment events from the card processor.

pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod integrations;
pub mod lifecycle;
pub mod routes;
pub mod server;
pub mod stale_order_worker;

#[cfg(test)]
mod endpoint_tests;
