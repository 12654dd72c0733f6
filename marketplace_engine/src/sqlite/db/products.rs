use log::{trace, warn};
use sqlx::SqliteConnection;

use crate::{db_types::Product, traits::MarketplaceError};

pub async fn fetch_product(product_id: &str, conn: &mut SqliteConnection) -> Result<Option<Product>, sqlx::Error> {
    sqlx::query_as("SELECT id, seller_id, name, price, image, stock FROM products WHERE id = $1")
        .bind(product_id)
        .fetch_optional(conn)
        .await
}

pub async fn upsert_product(product: &Product, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO products (id, seller_id, name, price, image, stock) VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (id) DO UPDATE SET
            seller_id = excluded.seller_id,
            name = excluded.name,
            price = excluded.price,
            image = excluded.image,
            stock = excluded.stock
        "#,
    )
    .bind(&product.id)
    .bind(&product.seller_id)
    .bind(&product.name)
    .bind(product.price)
    .bind(&product.image)
    .bind(product.stock)
    .execute(conn)
    .await?;
    Ok(())
}

/// Takes `quantity` units out of stock in a single conditional statement. Fails with
/// [`MarketplaceError::InsufficientStock`] rather than letting stock go negative.
pub async fn decrement_stock(
    product_id: &str,
    quantity: i64,
    conn: &mut SqliteConnection,
) -> Result<(), MarketplaceError> {
    let result = sqlx::query("UPDATE products SET stock = stock - $1 WHERE id = $2 AND stock >= $1")
        .bind(quantity)
        .bind(product_id)
        .execute(conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(MarketplaceError::InsufficientStock { product_id: product_id.to_string(), quantity });
    }
    trace!("🗃️ Reserved {quantity} of product {product_id}");
    Ok(())
}

/// Puts `quantity` units back into stock.
pub async fn restore_stock(product_id: &str, quantity: i64, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    let result =
        sqlx::query("UPDATE products SET stock = stock + $1 WHERE id = $2").bind(quantity).bind(product_id).execute(conn).await?;
    if result.rows_affected() == 0 {
        warn!("🗃️ Product {product_id} is no longer in the catalog. {quantity} unit(s) could not be returned to stock");
    } else {
        trace!("🗃️ Returned {quantity} of product {product_id} to stock");
    }
    Ok(())
}
