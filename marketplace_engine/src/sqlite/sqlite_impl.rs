//! `SqliteDatabase` is the SQLite backend for the marketplace engine.
//!
//! It implements every storage trait in [`crate::traits`] by composing the low-level functions in [`super::db`]
//! inside transactions.
use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;
use sqlx::{SqliteConnection, SqlitePool};

use super::db::{db_url, new_pool, orders, products, reports, sellers, sub_orders};
use crate::{
    db_types::{
        Order,
        OrderId,
        OrderItem,
        OrderStatus,
        PaymentStatus,
        Product,
        Seller,
        SellerApprovalStatus,
        SubOrder,
        SubOrderId,
    },
    order_objects::SubOrderQueryFilter,
    order_splitter::{plan_split, ResolvedLine, SplitPolicy, ValidatedCheckout},
    state_machine::cascade_status,
    traits::{
        CatalogManagement,
        DateRange,
        EarningsReporting,
        EarningsSummary,
        MarketplaceDatabase,
        MarketplaceError,
        OrderTransition,
        PaymentChange,
        SellerCommission,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SqliteDatabase ({})", self.url)
    }
}

async fn restore_items(items: &[OrderItem], conn: &mut SqliteConnection) -> Result<(), MarketplaceError> {
    for item in items {
        products::restore_stock(&item.product_id, item.quantity, &mut *conn).await?;
    }
    Ok(())
}

async fn fetch_order_or_fail(id: OrderId, conn: &mut SqliteConnection) -> Result<Order, MarketplaceError> {
    orders::fetch_order(id, conn).await?.ok_or(MarketplaceError::OrderNotFound(id))
}

async fn fetch_sub_order_or_fail(id: SubOrderId, conn: &mut SqliteConnection) -> Result<SubOrder, MarketplaceError> {
    sub_orders::fetch_sub_order(id, conn).await?.ok_or(MarketplaceError::SubOrderNotFound(id))
}

impl MarketplaceDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    /// In a single transaction:
    /// * resolves every line against the catalog and snapshots prices and commission rates,
    /// * inserts the master order, its items and one sub-order per seller,
    /// * reserves stock for every line.
    ///
    /// Any failure rolls the whole checkout back.
    async fn insert_split_order(
        &self,
        checkout: ValidatedCheckout,
        policy: &SplitPolicy,
        now: DateTime<Utc>,
    ) -> Result<Order, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let mut lines = Vec::with_capacity(checkout.lines().len());
        let mut resolved_sellers: Vec<Seller> = Vec::new();
        for line in checkout.lines() {
            let product = products::fetch_product(&line.product_id, &mut tx)
                .await?
                .ok_or_else(|| MarketplaceError::ProductNotFound(line.product_id.clone()))?;
            if !resolved_sellers.iter().any(|s| s.id == product.seller_id) {
                if let Some(seller) = sellers::fetch_seller(&product.seller_id, &mut tx).await? {
                    resolved_sellers.push(seller);
                }
            }
            lines.push(ResolvedLine { product, quantity: line.quantity });
        }
        let plan = plan_split(&checkout, &lines, &resolved_sellers, policy)?;
        let order_id = orders::insert_order(&plan, now, &mut tx).await?;
        for group in &plan.groups {
            sub_orders::insert_sub_order(order_id, &plan.buyer_id, group, now, &mut tx).await?;
        }
        for item in &plan.items {
            products::decrement_stock(&item.product_id, item.quantity, &mut tx).await?;
        }
        let order = fetch_order_or_fail(order_id, &mut tx).await?;
        tx.commit().await?;
        debug!(
            "🗃️ Order {order_id} for {} saved with {} sub-order(s). Total {}",
            order.buyer_id,
            order.sub_orders.len(),
            order.total_price
        );
        Ok(order)
    }

    async fn fetch_order(&self, id: OrderId) -> Result<Option<Order>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_order(id, &mut conn).await?)
    }

    async fn fetch_sub_order(&self, id: SubOrderId) -> Result<Option<SubOrder>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        sub_orders::fetch_sub_order(id, &mut conn).await
    }

    async fn fetch_sub_orders_for_order(&self, id: OrderId) -> Result<Vec<SubOrder>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        sub_orders::fetch_sub_orders_for_order(id, &mut conn).await
    }

    async fn fetch_orders_for_buyer(&self, buyer_id: &str) -> Result<Vec<Order>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_orders_for_buyer(buyer_id, &mut conn).await?)
    }

    async fn search_sub_orders(&self, query: SubOrderQueryFilter) -> Result<Vec<SubOrder>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        sub_orders::search_sub_orders(query, &mut conn).await
    }

    async fn fetch_stale_orders(&self, cutoff: DateTime<Utc>) -> Result<Vec<Order>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_stale_orders(cutoff, &mut conn).await?)
    }

    async fn update_order_status(
        &self,
        order: &Order,
        new_status: OrderStatus,
        now: DateTime<Utc>,
    ) -> Result<OrderTransition, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        orders::update_status(order, new_status, now, &mut tx).await?;
        let mut affected_sub_orders = Vec::new();
        for sub in sub_orders::fetch_sub_orders_for_order(order.id, &mut tx).await? {
            let Some(next) = cascade_status(&sub, new_status) else {
                continue;
            };
            sub_orders::update_status(&sub, next, now, &mut tx).await?;
            if next == OrderStatus::Cancelled {
                restore_items(&sub.items, &mut tx).await?;
            }
            affected_sub_orders.push(fetch_sub_order_or_fail(sub.id, &mut tx).await?);
        }
        let order = fetch_order_or_fail(order.id, &mut tx).await?;
        tx.commit().await?;
        debug!(
            "🗃️ Order {} is now {new_status}. {} sub-order(s) moved with it",
            order.id,
            affected_sub_orders.len()
        );
        Ok(OrderTransition { order, affected_sub_orders })
    }

    async fn update_sub_order_status(
        &self,
        sub_order: &SubOrder,
        new_status: OrderStatus,
        now: DateTime<Utc>,
    ) -> Result<SubOrder, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        sub_orders::update_status(sub_order, new_status, now, &mut tx).await?;
        if new_status == OrderStatus::Cancelled {
            restore_items(&sub_order.items, &mut tx).await?;
        }
        let updated = fetch_sub_order_or_fail(sub_order.id, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Sub-order {} is now {new_status}", updated.id);
        Ok(updated)
    }

    async fn update_seller_approval(
        &self,
        sub_order: &SubOrder,
        status: SellerApprovalStatus,
        now: DateTime<Utc>,
    ) -> Result<SubOrder, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        sub_orders::update_approval(sub_order, status, now, &mut tx).await?;
        let updated = fetch_sub_order_or_fail(sub_order.id, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Seller {} set approval of sub-order {} to {status}", updated.seller_id, updated.id);
        Ok(updated)
    }

    async fn update_payment_status(
        &self,
        order: &Order,
        change: PaymentChange,
        now: DateTime<Utc>,
    ) -> Result<OrderTransition, MarketplaceError> {
        let advance = |status: OrderStatus| {
            if change.status == PaymentStatus::Paid && status == OrderStatus::Pending {
                OrderStatus::Processing
            } else {
                status
            }
        };
        let mut tx = self.pool.begin().await?;
        orders::update_payment(order, &change, advance(order.order_status), now, &mut tx).await?;
        let mut affected_sub_orders = Vec::new();
        for sub in sub_orders::fetch_sub_orders_for_order(order.id, &mut tx).await? {
            let mirrors = match change.status {
                PaymentStatus::Refunded => sub.payment_status == PaymentStatus::Paid,
                PaymentStatus::Paid | PaymentStatus::Failed => {
                    sub.payment_status == PaymentStatus::Pending && sub.order_status != OrderStatus::Cancelled
                },
                PaymentStatus::Pending => false,
            };
            if !mirrors {
                continue;
            }
            let status = advance(sub.order_status);
            sub_orders::update_payment(&sub, change.status, change.refund_result.as_ref(), status, now, &mut tx).await?;
            affected_sub_orders.push(fetch_sub_order_or_fail(sub.id, &mut tx).await?);
        }
        let order = fetch_order_or_fail(order.id, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Order {} payment is now {}", order.id, order.payment_status);
        Ok(OrderTransition { order, affected_sub_orders })
    }

    async fn close(&mut self) -> Result<(), MarketplaceError> {
        self.pool.close().await;
        Ok(())
    }
}

impl CatalogManagement for SqliteDatabase {
    async fn upsert_seller(&self, seller: &Seller) -> Result<(), MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        sellers::upsert_seller(seller, &mut conn).await?;
        trace!("🗃️ Seller {} saved at {}", seller.id, seller.commission_rate);
        Ok(())
    }

    async fn upsert_product(&self, product: &Product) -> Result<(), MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        products::upsert_product(product, &mut conn).await?;
        trace!("🗃️ Product {} saved with {} in stock", product.id, product.stock);
        Ok(())
    }

    async fn fetch_seller(&self, seller_id: &str) -> Result<Option<Seller>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        sellers::fetch_seller(seller_id, &mut conn).await
    }

    async fn fetch_product(&self, product_id: &str) -> Result<Option<Product>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        Ok(products::fetch_product(product_id, &mut conn).await?)
    }
}

impl EarningsReporting for SqliteDatabase {
    async fn seller_earnings(&self, seller_id: &str, range: &DateRange) -> Result<EarningsSummary, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        Ok(reports::seller_earnings(seller_id, range, &mut conn).await?)
    }

    async fn commission_by_seller(&self, range: &DateRange) -> Result<Vec<SellerCommission>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        Ok(reports::commission_by_seller(range, &mut conn).await?)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object, using `MKT_DATABASE_URL`.
    pub async fn new(max_connections: u32) -> Result<Self, MarketplaceError> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, MarketplaceError> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Brings the schema up to date.
    pub async fn run_migrations(&self) -> Result<(), MarketplaceError> {
        sqlx::migrate!("./src/sqlite/migrations")
            .run(&self.pool)
            .await
            .map_err(|e| MarketplaceError::DatabaseError(format!("Migration failed. {e}")))?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
