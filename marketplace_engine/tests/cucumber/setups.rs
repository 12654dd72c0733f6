use cucumber::given;
use marketplace_engine::{
    db_types::{Money, Product, Seller},
    test_utils::seed::rate,
    CatalogManagement,
};

use crate::cucumber::{world::MarketplaceSystem, MarketplaceWorld};

#[given("a fresh marketplace")]
async fn fresh_marketplace(world: &mut MarketplaceWorld) {
    world.system = Some(MarketplaceSystem::new().await);
}

#[given(expr = "seller '{word}' charges {int}% commission")]
async fn seller_rate(world: &mut MarketplaceWorld, seller_id: String, percent: u32) {
    let seller = Seller::new(seller_id.as_str(), seller_id.as_str(), rate(f64::from(percent)));
    world.api().db().upsert_seller(&seller).await.expect("Error saving seller");
}

#[given(expr = "product '{word}' from '{word}' costs {int} with {int} in stock")]
async fn product(world: &mut MarketplaceWorld, product_id: String, seller_id: String, price: i64, stock: i64) {
    let product = Product::new(product_id.as_str(), seller_id.as_str(), product_id.as_str(), Money::from_major(price), stock);
    world.api().db().upsert_product(&product).await.expect("Error saving product");
}
