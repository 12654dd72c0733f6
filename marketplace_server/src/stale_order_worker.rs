//! The stale order reconciler.
//!
//! Unpaid card orders that have been pending for longer than the configured threshold are cancelled, and their stock
//! returned to the catalog. The job runs once at startup, then waits for the check interval, then runs again, until
//! it is told to shut down. Runs never overlap.
use std::future::Future;

use chrono::Duration;
use log::*;
use marketplace_engine::{order_objects::StaleOrderReport, MarketplaceError, OrderFlowApi, SqliteDatabase};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::ReconcilerConfig;

/// Starts the stale order worker, unless the reconciler is disabled in `config`.
///
/// The worker stops after its current run once `shutdown` is cancelled.
pub fn start_stale_order_worker(
    api: OrderFlowApi<SqliteDatabase>,
    config: ReconcilerConfig,
    shutdown: CancellationToken,
) -> Option<JoinHandle<()>> {
    let Some(threshold) = config.pending_threshold else {
        info!("🕰️ Stale order reconciler is disabled");
        return None;
    };
    info!(
        "🕰️ Stale order reconciler started. Unpaid card orders older than {} minutes are cancelled every {} minutes",
        threshold.num_minutes(),
        config.check_interval.num_minutes()
    );
    let handle = tokio::spawn(run_then_wait(config.check_interval, shutdown, move || {
        let api = api.clone();
        async move { api.cancel_stale_orders(threshold).await }
    }));
    Some(handle)
}

/// Calls `job`, then waits for `interval`, and repeats until `shutdown` fires. Failed runs are logged and the loop
/// carries on.
pub async fn run_then_wait<F, Fut>(interval: Duration, shutdown: CancellationToken, job: F)
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<StaleOrderReport, MarketplaceError>>,
{
    let interval = interval.to_std().unwrap_or_else(|e| {
        warn!("🕰️ Invalid check interval ({e}). Using one minute.");
        std::time::Duration::from_secs(60)
    });
    loop {
        if shutdown.is_cancelled() {
            break;
        }
        debug!("🕰️ Running stale order reconciliation");
        match job().await {
            Ok(report) if report.total_candidates == 0 => debug!("🕰️ No stale orders found"),
            Ok(report) => info!("🕰️ Stale order reconciliation complete. {report}"),
            Err(e) => error!("🕰️ Stale order reconciliation failed. {e}"),
        }
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(interval) => {},
        }
    }
    info!("🕰️ Stale order reconciler stopped");
}
