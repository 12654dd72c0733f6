use sqlx::SqliteConnection;

use crate::{commission::CommissionRate, db_types::Seller, traits::MarketplaceError};

pub async fn fetch_seller(seller_id: &str, conn: &mut SqliteConnection) -> Result<Option<Seller>, MarketplaceError> {
    let row: Option<(String, String, i64)> =
        sqlx::query_as("SELECT id, name, commission_rate FROM sellers WHERE id = $1")
            .bind(seller_id)
            .fetch_optional(conn)
            .await?;
    row.map(|(id, name, bps)| {
        let bps = u32::try_from(bps)
            .map_err(|e| MarketplaceError::DatabaseError(format!("Stored commission rate for {id} is invalid. {e}")))?;
        Ok(Seller { id, name, commission_rate: CommissionRate::from_basis_points(bps)? })
    })
    .transpose()
}

pub async fn upsert_seller(seller: &Seller, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO sellers (id, name, commission_rate) VALUES ($1, $2, $3)
        ON CONFLICT (id) DO UPDATE SET name = excluded.name, commission_rate = excluded.commission_rate
        "#,
    )
    .bind(&seller.id)
    .bind(&seller.name)
    .bind(i64::from(seller.commission_rate.basis_points()))
    .execute(conn)
    .await?;
    Ok(())
}
