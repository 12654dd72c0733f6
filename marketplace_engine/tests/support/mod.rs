#![allow(dead_code)]
use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use log::*;
use marketplace_engine::{
    db_types::{Checkout, Order, PaymentMethod, PaymentResult, PaymentStatus},
    events::EventProducers,
    helpers::MockClock,
    test_utils::{
        prepare_env::{prepare_test_env, random_db_path},
        seed::{address, seed_catalog},
    },
    MarketplaceDatabase,
    OrderFlowApi,
    SqliteDatabase,
};
use sqlx::{migrate::MigrateDatabase, Sqlite};

pub struct TestSystem {
    pub api: OrderFlowApi<SqliteDatabase>,
    pub clock: MockClock,
}

pub async fn setup() -> TestSystem {
    setup_with_producers(EventProducers::default()).await
}

pub async fn setup_with_producers(producers: EventProducers) -> TestSystem {
    let url = random_db_path();
    let db = prepare_test_env(&url).await;
    seed_catalog(&db).await;
    let clock = MockClock::new(Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap());
    let api = OrderFlowApi::new(db, producers).with_clock(Arc::new(clock.clone()));
    TestSystem { api, clock }
}

pub async fn tear_down(mut system: TestSystem) {
    let url = system.api.db().url().to_string();
    if let Err(e) = system.api.db_mut().close().await {
        error!("🚀️ Failed to close database: {e}");
    }
    if let Err(e) = Sqlite::drop_database(&url).await {
        warn!("🚀️ Could not remove test database {url}: {e}");
    }
}

pub fn checkout(buyer: &str, method: PaymentMethod, items: &[(&str, i64)]) -> Checkout {
    items.iter().fold(Checkout::new(buyer, address(), method), |c, (product, qty)| c.with_item(*product, *qty))
}

pub fn payment_result(id: &str) -> PaymentResult {
    PaymentResult {
        id: id.to_string(),
        status: "succeeded".into(),
        update_time: Utc.with_ymd_and_hms(2024, 6, 1, 12, 5, 0).unwrap(),
        email: Some("buyer@example.com".into()),
    }
}

pub async fn stock_of(system: &TestSystem, product_id: &str) -> i64 {
    use marketplace_engine::CatalogManagement;
    system.api.db().fetch_product(product_id).await.expect("Error fetching product").expect("No such product").stock
}

pub async fn paid_card_order(system: &TestSystem, buyer: &str, items: &[(&str, i64)], reference: &str) -> Order {
    let order = system.api.create_order(checkout(buyer, PaymentMethod::Card, items)).await.expect("Error creating order");
    system
        .api
        .update_payment_status(order.id, PaymentStatus::Paid, Some(payment_result(reference)))
        .await
        .expect("Error paying order")
}

pub fn minutes(n: i64) -> Duration {
    Duration::minutes(n)
}
