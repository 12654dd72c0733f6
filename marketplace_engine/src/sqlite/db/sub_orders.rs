use chrono::{DateTime, Utc};
use log::{debug, trace};
use mkt_common::Money;
use sqlx::{FromRow, QueryBuilder, SqliteConnection};

use super::{expect_one_row, orders::fetch_items, RefundColumns};
use crate::{
    commission::CommissionRate,
    db_types::{OrderId, OrderItem, OrderStatus, PaymentStatus, RefundResult, SellerApprovalStatus, SubOrder, SubOrderId},
    order_objects::SubOrderQueryFilter,
    order_splitter::SellerGroup,
    traits::MarketplaceError,
};

#[derive(Debug, FromRow)]
struct SubOrderRow {
    id: SubOrderId,
    master_order_id: OrderId,
    seller_id: String,
    buyer_id: String,
    subtotal: Money,
    commission_rate: i64,
    commission: Money,
    seller_earnings: Money,
    order_status: OrderStatus,
    payment_status: PaymentStatus,
    seller_approval_status: SellerApprovalStatus,
    earnings_released: bool,
    delivered_at: Option<DateTime<Utc>>,
    #[sqlx(flatten)]
    refund: RefundColumns,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: i64,
}

impl SubOrderRow {
    fn into_sub_order(self, items: Vec<OrderItem>) -> Result<SubOrder, MarketplaceError> {
        let commission_rate = u32::try_from(self.commission_rate)
            .map_err(|e| MarketplaceError::DatabaseError(format!("Stored commission rate is invalid. {e}")))
            .and_then(|bps| CommissionRate::from_basis_points(bps).map_err(MarketplaceError::from))?;
        Ok(SubOrder {
            id: self.id,
            master_order_id: self.master_order_id,
            seller_id: self.seller_id,
            buyer_id: self.buyer_id,
            items,
            subtotal: self.subtotal,
            commission_rate,
            commission: self.commission,
            seller_earnings: self.seller_earnings,
            order_status: self.order_status,
            payment_status: self.payment_status,
            seller_approval_status: self.seller_approval_status,
            earnings_released: self.earnings_released,
            delivered_at: self.delivered_at,
            refund_result: self.refund.into_refund_result(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            version: self.version,
        })
    }
}

async fn hydrate(rows: Vec<SubOrderRow>, conn: &mut SqliteConnection) -> Result<Vec<SubOrder>, MarketplaceError> {
    let mut result = Vec::with_capacity(rows.len());
    for row in rows {
        let items = fetch_items(row.master_order_id, Some(&row.seller_id), &mut *conn).await?;
        result.push(row.into_sub_order(items)?);
    }
    Ok(result)
}

/// Inserts the sub-order for one seller group of a checkout. Call it inside the checkout transaction, after the
/// master order has been inserted.
pub async fn insert_sub_order(
    master_order_id: OrderId,
    buyer_id: &str,
    group: &SellerGroup,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<SubOrderId, MarketplaceError> {
    let (id,): (SubOrderId,) = sqlx::query_as(
        r#"
            INSERT INTO sub_orders (
                master_order_id,
                seller_id,
                buyer_id,
                subtotal,
                commission_rate,
                commission,
                seller_earnings,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
            RETURNING id;
        "#,
    )
    .bind(master_order_id)
    .bind(&group.seller_id)
    .bind(buyer_id)
    .bind(group.subtotal)
    .bind(i64::from(group.commission_rate.basis_points()))
    .bind(group.split.commission)
    .bind(group.split.seller_earnings)
    .bind(now)
    .fetch_one(conn)
    .await?;
    debug!(
        "🗃️ Sub-order {id} for seller {} inserted. Subtotal {}, commission {} at {}",
        group.seller_id, group.subtotal, group.split.commission, group.commission_rate
    );
    Ok(id)
}

pub async fn fetch_sub_order(id: SubOrderId, conn: &mut SqliteConnection) -> Result<Option<SubOrder>, MarketplaceError> {
    let row: Option<SubOrderRow> =
        sqlx::query_as("SELECT * FROM sub_orders WHERE id = $1").bind(id).fetch_optional(&mut *conn).await?;
    match row {
        Some(row) => Ok(hydrate(vec![row], conn).await?.pop()),
        None => Ok(None),
    }
}

pub async fn fetch_sub_orders_for_order(
    id: OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<SubOrder>, MarketplaceError> {
    let rows: Vec<SubOrderRow> = sqlx::query_as("SELECT * FROM sub_orders WHERE master_order_id = $1 ORDER BY id")
        .bind(id)
        .fetch_all(&mut *conn)
        .await?;
    hydrate(rows, conn).await
}

/// Fetches sub-orders according to the criteria in the `SubOrderQueryFilter`, oldest first.
pub async fn search_sub_orders(
    query: SubOrderQueryFilter,
    conn: &mut SqliteConnection,
) -> Result<Vec<SubOrder>, MarketplaceError> {
    let mut builder = QueryBuilder::new("SELECT * FROM sub_orders ");
    if !query.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(seller_id) = query.seller_id {
        where_clause.push("seller_id = ");
        where_clause.push_bind_unseparated(seller_id);
    }
    if let Some(master) = query.master_order_id {
        where_clause.push("master_order_id = ");
        where_clause.push_bind_unseparated(master);
    }
    if let Some(status) = query.order_status {
        where_clause.push("order_status = ");
        where_clause.push_bind_unseparated(status);
    }
    if let Some(status) = query.payment_status {
        where_clause.push("payment_status = ");
        where_clause.push_bind_unseparated(status);
    }
    if let Some(approval) = query.seller_approval_status {
        where_clause.push("seller_approval_status = ");
        where_clause.push_bind_unseparated(approval);
    }
    if let Some(since) = query.since {
        where_clause.push("created_at >= ");
        where_clause.push_bind_unseparated(since);
    }
    if let Some(until) = query.until {
        where_clause.push("created_at <= ");
        where_clause.push_bind_unseparated(until);
    }
    builder.push(" ORDER BY created_at, id");
    trace!("🗃️ Executing query: {}", builder.sql());
    let rows: Vec<SubOrderRow> = builder.build_query_as::<SubOrderRow>().fetch_all(&mut *conn).await?;
    trace!("🗃️ Sub-order search returned {} rows", rows.len());
    hydrate(rows, conn).await
}

/// Sets the status of `sub_order` if it is unchanged since it was read. Delivery stamps `delivered_at` and releases
/// the seller's earnings.
pub async fn update_status(
    sub_order: &SubOrder,
    new_status: OrderStatus,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<(), MarketplaceError> {
    let delivered = new_status == OrderStatus::Delivered;
    let result = sqlx::query(
        r#"
        UPDATE sub_orders SET
            order_status = $1,
            delivered_at = COALESCE(delivered_at, $2),
            earnings_released = earnings_released OR $3,
            updated_at = $4,
            version = version + 1
        WHERE id = $5 AND version = $6
        "#,
    )
    .bind(new_status)
    .bind(delivered.then_some(now))
    .bind(delivered)
    .bind(now)
    .bind(sub_order.id)
    .bind(sub_order.version)
    .execute(conn)
    .await?;
    expect_one_row(result.rows_affected(), || {
        format!("Sub-order {} changed before it could be {new_status}", sub_order.id)
    })?;
    trace!("🗃️ Sub-order {} is now {new_status}", sub_order.id);
    Ok(())
}

pub async fn update_approval(
    sub_order: &SubOrder,
    status: SellerApprovalStatus,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<(), MarketplaceError> {
    let result = sqlx::query(
        "UPDATE sub_orders SET seller_approval_status = $1, updated_at = $2, version = version + 1 WHERE id = $3 AND \
         version = $4",
    )
    .bind(status)
    .bind(now)
    .bind(sub_order.id)
    .bind(sub_order.version)
    .execute(conn)
    .await?;
    expect_one_row(result.rows_affected(), || format!("Sub-order {} changed before it could be {status}", sub_order.id))
}

/// Mirrors a payment change of the master order onto `sub_order`.
pub async fn update_payment(
    sub_order: &SubOrder,
    status: PaymentStatus,
    refund: Option<&RefundResult>,
    order_status: OrderStatus,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<(), MarketplaceError> {
    let result = sqlx::query(
        r#"
        UPDATE sub_orders SET
            payment_status = $1,
            order_status = $2,
            refund_id = COALESCE($3, refund_id),
            refund_charge_id = COALESCE($4, refund_charge_id),
            refund_amount = COALESCE($5, refund_amount),
            refund_currency = COALESCE($6, refund_currency),
            refunded_at = COALESCE($7, refunded_at),
            updated_at = $8,
            version = version + 1
        WHERE id = $9 AND version = $10
        "#,
    )
    .bind(status)
    .bind(order_status)
    .bind(refund.map(|r| r.refund_id.as_str()))
    .bind(refund.map(|r| r.charge_id.as_str()))
    .bind(refund.map(|r| r.amount))
    .bind(refund.map(|r| r.currency.as_str()))
    .bind(refund.map(|r| r.refunded_at))
    .bind(now)
    .bind(sub_order.id)
    .bind(sub_order.version)
    .execute(conn)
    .await?;
    expect_one_row(result.rows_affected(), || {
        format!("Sub-order {} changed before its payment could be marked {status}", sub_order.id)
    })
}
