use std::{collections::HashMap, sync::Arc};

use chrono::{TimeZone, Utc};
use cucumber::World;
use log::*;
use marketplace_engine::{
    db_types::{Order, OrderId, SubOrder},
    events::EventProducers,
    helpers::MockClock,
    order_objects::StaleOrderReport,
    test_utils::{
        fake_processor::FakeProcessor,
        prepare_env::{create_database, random_db_path, run_migrations},
        seed::seed_catalog,
    },
    MarketplaceError,
    OrderFlowApi,
    PaymentApi,
    SqliteDatabase,
};

#[derive(Default, Debug, World)]
pub struct MarketplaceWorld {
    pub system: Option<MarketplaceSystem>,
    /// Orders by the name the scenario gave them
    pub orders: HashMap<String, OrderId>,
    pub last_error: Option<MarketplaceError>,
    pub last_report: Option<StaleOrderReport>,
}

#[derive(Debug)]
pub struct MarketplaceSystem {
    pub db_path: String,
    pub api: OrderFlowApi<SqliteDatabase>,
    pub payments: PaymentApi<SqliteDatabase, FakeProcessor>,
    pub processor: FakeProcessor,
    pub clock: MockClock,
}

impl MarketplaceWorld {
    pub fn system(&self) -> &MarketplaceSystem {
        self.system.as_ref().expect("Marketplace not initialised")
    }

    pub fn api(&self) -> &OrderFlowApi<SqliteDatabase> {
        &self.system().api
    }

    pub fn order_id(&self, name: &str) -> OrderId {
        *self.orders.get(name).unwrap_or_else(|| panic!("No order named {name}"))
    }

    pub async fn order(&self, name: &str) -> Order {
        let id = self.order_id(name);
        self.api().fetch_order(id).await.expect("Error fetching order").expect("Order does not exist")
    }

    pub async fn sub_order(&self, name: &str, seller_id: &str) -> SubOrder {
        let id = self.order_id(name);
        let subs = self.api().fetch_sub_orders_for_order(id).await.expect("Error fetching sub-orders");
        subs.into_iter()
            .find(|s| s.seller_id == seller_id)
            .unwrap_or_else(|| panic!("Order {name} has no sub-order for {seller_id}"))
    }

    /// Stores the error of a request that was expected to be rejected.
    pub fn record_outcome<T>(&mut self, result: Result<T, MarketplaceError>) {
        match result {
            Ok(_) => self.last_error = None,
            Err(e) => {
                debug!("🚀️ Request rejected: {e}");
                self.last_error = Some(e);
            },
        }
    }
}

impl MarketplaceSystem {
    pub async fn new() -> Self {
        let url = random_db_path();
        create_database(&url).await;
        let db = run_migrations(&url).await;
        seed_catalog(&db).await;
        debug!("🚀️ Created database: {url}");
        let clock = MockClock::new(Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap());
        let api = OrderFlowApi::new(db, EventProducers::default()).with_clock(Arc::new(clock.clone()));
        let processor = FakeProcessor::new();
        let payments = PaymentApi::new(api.clone(), processor.clone());
        Self { db_path: url, api, payments, processor, clock }
    }
}
