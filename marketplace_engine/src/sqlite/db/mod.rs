//! # SQLite Database methods
//!
//! "Low-level" SQLite interactions for the marketplace engine.
//!
//! Every interaction is a plain function that accepts a `&mut SqliteConnection`. Callers either take a connection from
//! the pool, or open a transaction and pass `&mut tx`, without any other changes. [`crate::SqliteDatabase`] composes
//! these functions into the atomic operations of the storage traits.
//!
//! Mutations of orders and sub-orders are compare-and-swap updates on the `version` column. An update that matches no
//! row means the record changed since the caller read it, and is reported as
//! [`MarketplaceError::VersionConflict`].
use std::env;

use chrono::{DateTime, Utc};
use log::info;
use mkt_common::Money;
use sqlx::{sqlite::SqlitePoolOptions, Error as SqlxError, FromRow, SqlitePool};

use crate::{db_types::RefundResult, traits::MarketplaceError};

pub mod orders;
pub mod products;
pub mod reports;
pub mod sellers;
pub mod sub_orders;

const SQLITE_DB_URL: &str = "sqlite://data/marketplace.db";

pub fn db_url() -> String {
    let result = env::var("MKT_DATABASE_URL").unwrap_or_else(|_| {
        info!("🗃️ MKT_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("🗃️ Using database URL: {result}");
    result
}

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqlxError> {
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect(url).await?;
    Ok(pool)
}

/// The refund columns shared by `orders` and `sub_orders`.
#[derive(Debug, Clone, FromRow)]
pub(crate) struct RefundColumns {
    refund_id: Option<String>,
    refund_charge_id: Option<String>,
    refund_amount: Option<Money>,
    refund_currency: Option<String>,
    refunded_at: Option<DateTime<Utc>>,
}

impl RefundColumns {
    pub(crate) fn into_refund_result(self) -> Option<RefundResult> {
        Some(RefundResult {
            refund_id: self.refund_id?,
            charge_id: self.refund_charge_id.unwrap_or_default(),
            amount: self.refund_amount.unwrap_or_default(),
            currency: self.refund_currency.unwrap_or_default(),
            refunded_at: self.refunded_at?,
        })
    }
}

/// Maps the outcome of a versioned update onto the conflict error.
pub(crate) fn expect_one_row(rows_affected: u64, what: impl FnOnce() -> String) -> Result<(), MarketplaceError> {
    if rows_affected == 0 {
        Err(MarketplaceError::VersionConflict(what()))
    } else {
        Ok(())
    }
}
