//! A small catalog for tests.
//!
//! | seller | rate | product  | price  | stock |
//! |--------|------|----------|--------|-------|
//! | alice  | 20%  | lamp     | 35.00  | 10    |
//! | alice  | 20%  | rug      | 25.00  | 10    |
//! | alice  | 20%  | vase     | 50.00  | 10    |
//! | bob    | 10%  | novel    | 20.00  | 10    |
//! | bob    | 10%  | atlas    | 40.00  | 1     |
use crate::{
    commission::CommissionRate,
    db_types::{Money, Product, Seller, ShippingAddress},
    traits::CatalogManagement,
};

pub fn rate(percent: f64) -> CommissionRate {
    CommissionRate::from_percent(percent).expect("valid commission rate")
}

pub fn sellers() -> Vec<Seller> {
    vec![Seller::new("alice", "Alice's Attic", rate(20.0)), Seller::new("bob", "Bob's Books", rate(10.0))]
}

pub fn products() -> Vec<Product> {
    vec![
        Product::new("lamp", "alice", "Brass lamp", Money::from_major(35), 10).with_image("/img/lamp.png"),
        Product::new("rug", "alice", "Wool rug", Money::from_major(25), 10),
        Product::new("vase", "alice", "Glass vase", Money::from_major(50), 10),
        Product::new("novel", "bob", "Paperback novel", Money::from_major(20), 10),
        Product::new("atlas", "bob", "World atlas", Money::from_major(40), 1),
    ]
}

pub async fn seed_catalog<B: CatalogManagement>(db: &B) {
    for seller in sellers() {
        db.upsert_seller(&seller).await.expect("Error seeding seller");
    }
    for product in products() {
        db.upsert_product(&product).await.expect("Error seeding product");
    }
}

pub fn address() -> ShippingAddress {
    ShippingAddress::new("1 Main St", "Springfield", "12345", "US")
}
