use crate::{
    db_types::{Product, Seller},
    traits::MarketplaceError,
};

/// Access to the product catalog and seller profiles.
///
/// Catalog maintenance belongs to other services. The engine only needs to read products and sellers at checkout
/// time, and to seed them in tests and tooling.
#[allow(async_fn_in_trait)]
pub trait CatalogManagement {
    /// Inserts the seller, or replaces the name and commission rate of an existing one.
    async fn upsert_seller(&self, seller: &Seller) -> Result<(), MarketplaceError>;

    /// Inserts the product, or replaces every field of an existing one, including stock.
    async fn upsert_product(&self, product: &Product) -> Result<(), MarketplaceError>;

    async fn fetch_seller(&self, seller_id: &str) -> Result<Option<Seller>, MarketplaceError>;

    async fn fetch_product(&self, product_id: &str) -> Result<Option<Product>, MarketplaceError>;
}
