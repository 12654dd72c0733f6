use chrono::{DateTime, Utc};
use log::{debug, trace};
use mkt_common::Money;
use sqlx::{FromRow, SqliteConnection};

use super::{expect_one_row, RefundColumns};
use crate::{
    db_types::{
        Order,
        OrderId,
        OrderItem,
        OrderStatus,
        PaymentMethod,
        PaymentResult,
        PaymentStatus,
        ShippingAddress,
        SubOrderId,
    },
    order_splitter::SplitPlan,
    traits::{MarketplaceError, PaymentChange},
};

#[derive(Debug, FromRow)]
struct OrderRow {
    id: OrderId,
    buyer_id: String,
    shipping_address: String,
    shipping_city: String,
    shipping_postal_code: String,
    shipping_country: String,
    payment_method: PaymentMethod,
    payment_status: PaymentStatus,
    payment_id: Option<String>,
    payment_state: Option<String>,
    payment_update_time: Option<DateTime<Utc>>,
    payment_email: Option<String>,
    #[sqlx(flatten)]
    refund: RefundColumns,
    items_price: Money,
    tax_price: Money,
    shipping_price: Money,
    total_price: Money,
    currency: String,
    order_status: OrderStatus,
    is_master_order: bool,
    delivered_at: Option<DateTime<Utc>>,
    paid_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: i64,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>, sub_orders: Vec<SubOrderId>) -> Order {
        let payment_result = match (self.payment_id, self.payment_update_time) {
            (Some(id), Some(update_time)) => Some(PaymentResult {
                id,
                status: self.payment_state.unwrap_or_default(),
                update_time,
                email: self.payment_email,
            }),
            _ => None,
        };
        Order {
            id: self.id,
            buyer_id: self.buyer_id,
            items,
            shipping_address: ShippingAddress {
                address: self.shipping_address,
                city: self.shipping_city,
                postal_code: self.shipping_postal_code,
                country: self.shipping_country,
            },
            payment_method: self.payment_method,
            payment_status: self.payment_status,
            payment_result,
            refund_result: self.refund.into_refund_result(),
            items_price: self.items_price,
            tax_price: self.tax_price,
            shipping_price: self.shipping_price,
            total_price: self.total_price,
            currency: self.currency,
            order_status: self.order_status,
            is_master_order: self.is_master_order,
            delivered_at: self.delivered_at,
            paid_at: self.paid_at,
            sub_orders,
            created_at: self.created_at,
            updated_at: self.updated_at,
            version: self.version,
        }
    }
}

/// Inserts the master order and its item snapshot. This is not atomic on its own; call it inside the checkout
/// transaction.
pub async fn insert_order(
    plan: &SplitPlan,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<OrderId, MarketplaceError> {
    let (id,): (OrderId,) = sqlx::query_as(
        r#"
            INSERT INTO orders (
                buyer_id,
                shipping_address,
                shipping_city,
                shipping_postal_code,
                shipping_country,
                payment_method,
                items_price,
                tax_price,
                shipping_price,
                total_price,
                currency,
                is_master_order,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $13)
            RETURNING id;
        "#,
    )
    .bind(&plan.buyer_id)
    .bind(&plan.shipping_address.address)
    .bind(&plan.shipping_address.city)
    .bind(&plan.shipping_address.postal_code)
    .bind(&plan.shipping_address.country)
    .bind(plan.payment_method)
    .bind(plan.totals.items_price)
    .bind(plan.totals.tax_price)
    .bind(plan.totals.shipping_price)
    .bind(plan.totals.total_price)
    .bind(&plan.currency)
    .bind(plan.is_master_order)
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;
    for (position, item) in plan.items.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO order_items (order_id, position, product_id, name, quantity, unit_price, image, seller_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(id)
        .bind(position as i64)
        .bind(&item.product_id)
        .bind(&item.name)
        .bind(item.quantity)
        .bind(item.unit_price)
        .bind(&item.image)
        .bind(&item.seller_id)
        .execute(&mut *conn)
        .await?;
    }
    debug!("🗃️ Order {id} inserted with {} line items", plan.items.len());
    Ok(id)
}

/// The item snapshot of an order, optionally restricted to one seller's lines, in checkout order.
pub async fn fetch_items(
    id: OrderId,
    seller_id: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<Vec<OrderItem>, sqlx::Error> {
    let items = match seller_id {
        Some(seller) => {
            sqlx::query_as(
                "SELECT product_id, name, quantity, unit_price, image, seller_id FROM order_items WHERE order_id = $1 \
                 AND seller_id = $2 ORDER BY position",
            )
            .bind(id)
            .bind(seller)
            .fetch_all(conn)
            .await?
        },
        None => {
            sqlx::query_as(
                "SELECT product_id, name, quantity, unit_price, image, seller_id FROM order_items WHERE order_id = $1 \
                 ORDER BY position",
            )
            .bind(id)
            .fetch_all(conn)
            .await?
        },
    };
    Ok(items)
}

async fn hydrate(row: OrderRow, conn: &mut SqliteConnection) -> Result<Order, sqlx::Error> {
    let items = fetch_items(row.id, None, &mut *conn).await?;
    let sub_orders: Vec<(SubOrderId,)> =
        sqlx::query_as("SELECT id FROM sub_orders WHERE master_order_id = $1 ORDER BY id")
            .bind(row.id)
            .fetch_all(&mut *conn)
            .await?;
    Ok(row.into_order(items, sub_orders.into_iter().map(|(id,)| id).collect()))
}

async fn hydrate_all(rows: Vec<OrderRow>, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let mut orders = Vec::with_capacity(rows.len());
    for row in rows {
        orders.push(hydrate(row, &mut *conn).await?);
    }
    Ok(orders)
}

pub async fn fetch_order(id: OrderId, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    let row: Option<OrderRow> =
        sqlx::query_as("SELECT * FROM orders WHERE id = $1").bind(id).fetch_optional(&mut *conn).await?;
    match row {
        Some(row) => Ok(Some(hydrate(row, conn).await?)),
        None => Ok(None),
    }
}

pub async fn fetch_orders_for_buyer(buyer_id: &str, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let rows: Vec<OrderRow> = sqlx::query_as("SELECT * FROM orders WHERE buyer_id = $1 ORDER BY created_at, id")
        .bind(buyer_id)
        .fetch_all(&mut *conn)
        .await?;
    hydrate_all(rows, conn).await
}

/// Unpaid card orders that are still pending and were created before `cutoff`, oldest first.
pub async fn fetch_stale_orders(cutoff: DateTime<Utc>, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let rows: Vec<OrderRow> = sqlx::query_as(
        r#"
        SELECT * FROM orders
        WHERE payment_method = 'card'
          AND payment_status = 'pending'
          AND order_status = 'pending'
          AND created_at < $1
        ORDER BY created_at, id
        "#,
    )
    .bind(cutoff)
    .fetch_all(&mut *conn)
    .await?;
    trace!("🗃️ {} stale order(s) created before {cutoff}", rows.len());
    hydrate_all(rows, conn).await
}

/// Sets the status of `order`, provided it has not changed since it was read. `delivered_at` is set the first time the
/// order is delivered.
pub async fn update_status(
    order: &Order,
    new_status: OrderStatus,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<(), MarketplaceError> {
    let delivered_at = (new_status == OrderStatus::Delivered).then_some(now);
    let result = sqlx::query(
        r#"
        UPDATE orders SET
            order_status = $1,
            delivered_at = COALESCE(delivered_at, $2),
            updated_at = $3,
            version = version + 1
        WHERE id = $4 AND version = $5
        "#,
    )
    .bind(new_status)
    .bind(delivered_at)
    .bind(now)
    .bind(order.id)
    .bind(order.version)
    .execute(conn)
    .await?;
    expect_one_row(result.rows_affected(), || format!("Order {} changed before it could be {new_status}", order.id))?;
    trace!("🗃️ Order {} is now {new_status}", order.id);
    Ok(())
}

/// Applies a payment change to `order`, provided it has not changed since it was read.
///
/// Payment and refund details are only overwritten when the change carries them. `paid_at` is set the first time the
/// order is paid.
pub async fn update_payment(
    order: &Order,
    change: &PaymentChange,
    order_status: OrderStatus,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<(), MarketplaceError> {
    let paid_at = (change.status == PaymentStatus::Paid).then_some(now);
    let payment = change.payment_result.as_ref();
    let refund = change.refund_result.as_ref();
    let result = sqlx::query(
        r#"
        UPDATE orders SET
            payment_status = $1,
            order_status = $2,
            payment_id = COALESCE($3, payment_id),
            payment_state = COALESCE($4, payment_state),
            payment_update_time = COALESCE($5, payment_update_time),
            payment_email = COALESCE($6, payment_email),
            refund_id = COALESCE($7, refund_id),
            refund_charge_id = COALESCE($8, refund_charge_id),
            refund_amount = COALESCE($9, refund_amount),
            refund_currency = COALESCE($10, refund_currency),
            refunded_at = COALESCE($11, refunded_at),
            paid_at = COALESCE(paid_at, $12),
            updated_at = $13,
            version = version + 1
        WHERE id = $14 AND version = $15
        "#,
    )
    .bind(change.status)
    .bind(order_status)
    .bind(payment.map(|p| p.id.as_str()))
    .bind(payment.map(|p| p.status.as_str()))
    .bind(payment.map(|p| p.update_time))
    .bind(payment.and_then(|p| p.email.as_deref()))
    .bind(refund.map(|r| r.refund_id.as_str()))
    .bind(refund.map(|r| r.charge_id.as_str()))
    .bind(refund.map(|r| r.amount))
    .bind(refund.map(|r| r.currency.as_str()))
    .bind(refund.map(|r| r.refunded_at))
    .bind(paid_at)
    .bind(now)
    .bind(order.id)
    .bind(order.version)
    .execute(conn)
    .await?;
    expect_one_row(result.rows_affected(), || {
        format!("Order {} changed before its payment could be marked {}", order.id, change.status)
    })?;
    trace!("🗃️ Order {} payment is now {}", order.id, change.status);
    Ok(())
}
