//! Process-wide state of a running marketplace.
//!
//! [`Marketplace`] owns the database handle, the engine event handlers and the stale order worker. It is built once at
//! startup, handed to the HTTP server, and shut down explicitly when the server stops.
use futures::FutureExt;
use log::*;
use marketplace_engine::{
    events::{EventHandlers, EventHooks},
    MarketplaceDatabase,
    OrderFlowApi,
    PaymentApi,
    PaymentProcessor,
    SqliteDatabase,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{config::ServerConfig, errors::ServerError, stale_order_worker::start_stale_order_worker};

const MAX_DB_CONNECTIONS: u32 = 25;
const EVENT_BUFFER_SIZE: usize = 64;

pub struct Marketplace {
    flow: OrderFlowApi<SqliteDatabase>,
    shutdown: CancellationToken,
    worker: Option<JoinHandle<()>>,
}

impl Marketplace {
    /// Connects to the configured database, brings its schema up to date and starts the background tasks.
    pub async fn start(config: &ServerConfig) -> Result<Self, ServerError> {
        let db = SqliteDatabase::new_with_url(&config.database_url, MAX_DB_CONNECTIONS)
            .await
            .map_err(|e| ServerError::InitializeError(e.to_string()))?;
        db.run_migrations().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
        Ok(Self::start_with_db(db, config).await)
    }

    /// Starts the event handlers and the stale order worker on an already prepared database.
    pub async fn start_with_db(db: SqliteDatabase, config: &ServerConfig) -> Self {
        let handlers = EventHandlers::new(EVENT_BUFFER_SIZE, log_only_hooks());
        let producers = handlers.producers();
        handlers.start_handlers().await;
        let flow = OrderFlowApi::new(db, producers).with_policy(config.split_policy.clone());
        let shutdown = CancellationToken::new();
        let worker = start_stale_order_worker(flow.clone(), config.reconciler, shutdown.clone());
        Self { flow, shutdown, worker }
    }

    pub fn flow(&self) -> &OrderFlowApi<SqliteDatabase> {
        &self.flow
    }

    pub fn payments<P: PaymentProcessor>(&self, processor: P) -> PaymentApi<SqliteDatabase, P> {
        PaymentApi::new(self.flow.clone(), processor)
    }

    pub fn is_reconciling(&self) -> bool {
        self.worker.as_ref().map(|w| !w.is_finished()).unwrap_or(false)
    }

    /// Stops the stale order worker (after its current run, if any) and closes the database.
    pub async fn shutdown(mut self) {
        info!("🚀️ Shutting down the marketplace");
        self.shutdown.cancel();
        if let Some(worker) = self.worker.take() {
            if let Err(e) = worker.await {
                error!("🕰️ Stale order worker did not stop cleanly. {e}");
            }
        }
        if let Err(e) = self.flow.db_mut().close().await {
            error!("🗃️ Could not close the database. {e}");
        }
    }
}

/// Hooks that record every engine event in the log. Buyer and seller notifications plug in here.
pub fn log_only_hooks() -> EventHooks {
    let mut hooks = EventHooks::default();
    hooks
        .on_order_created(|ev| {
            info!(
                "📬️ Order {} created for {}: {} {} across {} sub-order(s)",
                ev.order.id,
                ev.order.buyer_id,
                ev.order.total_price,
                ev.order.currency,
                ev.sub_orders.len()
            );
            async {}.boxed()
        })
        .on_order_paid(|ev| {
            info!("📬️ Order {} paid ({} {})", ev.order.id, ev.order.total_price, ev.order.currency);
            async {}.boxed()
        })
        .on_order_annulled(|ev| {
            info!("📬️ Order {} annulled. {}", ev.order.id, ev.reason);
            async {}.boxed()
        })
        .on_earnings_released(|ev| {
            info!(
                "📬️ Earnings of {} released to seller {} for sub-order {}",
                ev.sub_order.seller_earnings, ev.sub_order.seller_id, ev.sub_order.id
            );
            async {}.boxed()
        })
        .on_order_refunded(|ev| {
            info!(
                "📬️ Order {} refunded {} {} ({})",
                ev.order.id, ev.refund.amount, ev.refund.currency, ev.refund.refund_id
            );
            async {}.boxed()
        });
    hooks
}
