//! Read-only aggregates over paid sub-orders. Cancelled sub-orders owe their seller nothing and are left out.
use mkt_common::Money;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection};

use crate::traits::{DateRange, EarningsSummary, SellerCommission};

const SUMMARY_COLUMNS: &str = r#"
    COALESCE(SUM(subtotal), 0) AS total_sales,
    COALESCE(SUM(commission), 0) AS total_commission,
    COALESCE(SUM(seller_earnings), 0) AS total_earnings,
    COALESCE(SUM(CASE WHEN earnings_released THEN seller_earnings ELSE 0 END), 0) AS released_earnings,
    COALESCE(SUM(CASE WHEN earnings_released THEN 0 ELSE seller_earnings END), 0) AS pending_earnings,
    COUNT(*) AS order_count
"#;

#[derive(Debug, FromRow)]
struct SummaryRow {
    total_sales: i64,
    total_commission: i64,
    total_earnings: i64,
    released_earnings: i64,
    pending_earnings: i64,
    order_count: i64,
}

impl From<SummaryRow> for EarningsSummary {
    fn from(row: SummaryRow) -> Self {
        Self {
            total_sales: Money::from(row.total_sales),
            total_commission: Money::from(row.total_commission),
            total_earnings: Money::from(row.total_earnings),
            released_earnings: Money::from(row.released_earnings),
            pending_earnings: Money::from(row.pending_earnings),
            order_count: row.order_count,
        }
    }
}

#[derive(Debug, FromRow)]
struct SellerSummaryRow {
    seller_id: String,
    seller_name: Option<String>,
    #[sqlx(flatten)]
    summary: SummaryRow,
}

fn push_range(builder: &mut QueryBuilder<'_, Sqlite>, range: &DateRange) {
    if let Some(since) = range.since {
        builder.push(" AND sub_orders.created_at >= ");
        builder.push_bind(since);
    }
    if let Some(until) = range.until {
        builder.push(" AND sub_orders.created_at <= ");
        builder.push_bind(until);
    }
}

pub async fn seller_earnings(
    seller_id: &str,
    range: &DateRange,
    conn: &mut SqliteConnection,
) -> Result<EarningsSummary, sqlx::Error> {
    let mut builder = QueryBuilder::new("SELECT ");
    builder.push(SUMMARY_COLUMNS);
    builder.push(" FROM sub_orders WHERE payment_status = 'paid' AND order_status != 'cancelled' AND seller_id = ");
    builder.push_bind(seller_id.to_string());
    push_range(&mut builder, range);
    let row = builder.build_query_as::<SummaryRow>().fetch_one(conn).await?;
    Ok(row.into())
}

/// Totals per seller, highest commission first. Sellers with no paid sub-orders in the range are absent.
pub async fn commission_by_seller(
    range: &DateRange,
    conn: &mut SqliteConnection,
) -> Result<Vec<SellerCommission>, sqlx::Error> {
    let mut builder = QueryBuilder::new("SELECT sub_orders.seller_id AS seller_id, sellers.name AS seller_name, ");
    builder.push(SUMMARY_COLUMNS);
    builder.push(
        " FROM sub_orders LEFT JOIN sellers ON sellers.id = sub_orders.seller_id WHERE sub_orders.payment_status = \
         'paid' AND sub_orders.order_status != 'cancelled'",
    );
    push_range(&mut builder, range);
    builder.push(" GROUP BY sub_orders.seller_id ORDER BY total_commission DESC, sub_orders.seller_id");
    let rows = builder.build_query_as::<SellerSummaryRow>().fetch_all(conn).await?;
    Ok(rows
        .into_iter()
        .map(|r| SellerCommission { seller_id: r.seller_id, seller_name: r.seller_name, summary: r.summary.into() })
        .collect())
}
