use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{
    commission::CommissionRateError,
    db_types::{Order, OrderId, OrderStatus, PaymentStatus, SellerApprovalStatus, SubOrder, SubOrderId},
    order_objects::SubOrderQueryFilter,
    order_splitter::{SplitPolicy, ValidatedCheckout},
    traits::data_objects::{OrderTransition, PaymentChange},
};

/// SQLite result codes that signal lock contention between writers (`SQLITE_BUSY`, `SQLITE_LOCKED` and their
/// extended variants). These are reported as version conflicts so that callers re-read and try again.
const CONTENTION_CODES: [&str; 5] = ["5", "6", "261", "262", "517"];

#[derive(Debug, Clone, Error)]
pub enum MarketplaceError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Sub-order {0} does not exist")]
    SubOrderNotFound(SubOrderId),
    #[error("Product {0} does not exist")]
    ProductNotFound(String),
    #[error("Seller {0} does not exist")]
    SellerNotFound(String),
    #[error("Forbidden. {0}")]
    Forbidden(String),
    #[error("The order is {0} and can no longer change status")]
    OrderLocked(OrderStatus),
    #[error("{0} seller approval(s) are still pending")]
    PendingSellerApproval(usize),
    #[error("Cannot change order status from {from} to {to}")]
    InvalidStatusTransition { from: OrderStatus, to: OrderStatus },
    #[error("Cannot change payment status from {from} to {to}")]
    InvalidPaymentTransition { from: PaymentStatus, to: PaymentStatus },
    #[error("Cannot change seller approval from {from} to {to}")]
    InvalidApprovalTransition { from: SellerApprovalStatus, to: SellerApprovalStatus },
    #[error("Product {product_id} is out of stock. {requested} requested, {available} available")]
    OutOfStock { product_id: String, requested: i64, available: i64 },
    #[error("Insufficient stock to reserve {quantity} of product {product_id}")]
    InsufficientStock { product_id: String, quantity: i64 },
    #[error("{0}")]
    InvalidCommissionRate(String),
    #[error("The order is not eligible for a refund. {0}")]
    RefundNotEligible(String),
    #[error("Order {0} has already been refunded")]
    AlreadyRefunded(OrderId),
    #[error("Payment processor error. {0}")]
    PaymentProcessorError(String),
    #[error("Invalid request. {0}")]
    ValidationError(String),
    #[error("The record was modified concurrently. {0}")]
    VersionConflict(String),
}

impl MarketplaceError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::OrderNotFound(_) | Self::SubOrderNotFound(_) | Self::ProductNotFound(_) | Self::SellerNotFound(_)
        )
    }
}

impl From<sqlx::Error> for MarketplaceError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db_err)
                if db_err.code().map(|c| CONTENTION_CODES.contains(&c.as_ref())).unwrap_or(false) =>
            {
                Self::VersionConflict(db_err.message().to_string())
            },
            _ => Self::DatabaseError(e.to_string()),
        }
    }
}

impl From<CommissionRateError> for MarketplaceError {
    fn from(e: CommissionRateError) -> Self {
        Self::InvalidCommissionRate(e.to_string())
    }
}

/// The storage contract for the order splitting and settlement engine.
///
/// Every mutating method takes the snapshot that the caller validated its business rules against. Implementations
/// must apply the change only if the stored `version` still matches the snapshot, and return
/// [`MarketplaceError::VersionConflict`] otherwise. All side effects of a single call (cascades to sub-orders,
/// stock adjustments) are atomic.
#[allow(async_fn_in_trait)]
pub trait MarketplaceDatabase: Clone {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Persists a checkout as one master order plus one sub-order per seller, and reserves stock for every line.
    ///
    /// Products and sellers are resolved inside the same transaction, so prices, names and commission rates are
    /// snapshotted at the moment of purchase. Nothing is written if any step fails.
    async fn insert_split_order(
        &self,
        checkout: ValidatedCheckout,
        policy: &SplitPolicy,
        now: DateTime<Utc>,
    ) -> Result<Order, MarketplaceError>;

    async fn fetch_order(&self, id: OrderId) -> Result<Option<Order>, MarketplaceError>;

    async fn fetch_sub_order(&self, id: SubOrderId) -> Result<Option<SubOrder>, MarketplaceError>;

    async fn fetch_sub_orders_for_order(&self, id: OrderId) -> Result<Vec<SubOrder>, MarketplaceError>;

    /// Orders placed by the buyer, oldest first.
    async fn fetch_orders_for_buyer(&self, buyer_id: &str) -> Result<Vec<Order>, MarketplaceError>;

    async fn search_sub_orders(&self, query: SubOrderQueryFilter) -> Result<Vec<SubOrder>, MarketplaceError>;

    /// Card orders, still pending and unpaid, that were created before `cutoff`.
    async fn fetch_stale_orders(&self, cutoff: DateTime<Utc>) -> Result<Vec<Order>, MarketplaceError>;

    /// Moves the master order to `new_status`.
    ///
    /// * `Delivered` also delivers every non-terminal sub-order and releases its earnings.
    /// * `Cancelled` also cancels every non-terminal sub-order and returns the stock of exactly those sub-orders'
    ///   items.
    async fn update_order_status(
        &self,
        order: &Order,
        new_status: OrderStatus,
        now: DateTime<Utc>,
    ) -> Result<OrderTransition, MarketplaceError>;

    /// Moves a single sub-order to `new_status`. Delivery releases its earnings and cancellation returns its stock.
    async fn update_sub_order_status(
        &self,
        sub_order: &SubOrder,
        new_status: OrderStatus,
        now: DateTime<Utc>,
    ) -> Result<SubOrder, MarketplaceError>;

    async fn update_seller_approval(
        &self,
        sub_order: &SubOrder,
        status: SellerApprovalStatus,
        now: DateTime<Utc>,
    ) -> Result<SubOrder, MarketplaceError>;

    /// Applies a payment status change to the order and mirrors it onto the sub-orders.
    ///
    /// `Paid` sets `paid_at`, stores the processor's payment result and advances pending orders and sub-orders to
    /// `Processing`. `Refunded` stores the refund result.
    async fn update_payment_status(
        &self,
        order: &Order,
        change: PaymentChange,
        now: DateTime<Utc>,
    ) -> Result<OrderTransition, MarketplaceError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), MarketplaceError>;
}
