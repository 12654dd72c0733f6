use std::env;

use chrono::Duration;
use log::*;
use marketplace_engine::{
    commission::{CommissionRate, DEFAULT_MAX_COMMISSION_RATE},
    order_splitter::SplitPolicy,
};
use mkt_common::DEFAULT_CURRENCY_CODE;
use stripe_tools::StripeConfig;

const DEFAULT_MKT_HOST: &str = "127.0.0.1";
const DEFAULT_MKT_PORT: u16 = 8380;
const DEFAULT_AUTO_CANCEL_PENDING_MINUTES: i64 = 30;
const DEFAULT_AUTO_CANCEL_CHECK_INTERVAL_MINUTES: i64 = 5;
const MIN_AUTO_CANCEL_CHECK_INTERVAL_MINUTES: i64 = 1;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Currency and commission ceiling applied at checkout
    pub split_policy: SplitPolicy,
    pub reconciler: ReconcilerConfig,
    pub stripe: StripeConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_MKT_HOST.to_string(),
            port: DEFAULT_MKT_PORT,
            database_url: String::default(),
            split_policy: SplitPolicy::default(),
            reconciler: ReconcilerConfig::default(),
            stripe: StripeConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("MKT_HOST").ok().unwrap_or_else(|| DEFAULT_MKT_HOST.into());
        let port = env::var("MKT_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for MKT_PORT. {e} Using the default, {DEFAULT_MKT_PORT}, instead."
                    );
                    DEFAULT_MKT_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_MKT_PORT);
        let database_url = env::var("MKT_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ MKT_DATABASE_URL is not set. Please set it to the URL for the marketplace database.");
            String::default()
        });
        let split_policy = split_policy_from(env::var("MKT_CURRENCY").ok(), env::var("MKT_MAX_COMMISSION_RATE").ok());
        let reconciler = ReconcilerConfig::from_values(
            env::var("MKT_ORDER_AUTO_CANCEL_PENDING_MINUTES").ok(),
            env::var("MKT_ORDER_AUTO_CANCEL_CHECK_INTERVAL_MINUTES").ok(),
        );
        let stripe = StripeConfig::new_from_env_or_default();
        Self { host, port, database_url, split_policy, reconciler, stripe }
    }
}

fn split_policy_from(currency: Option<String>, max_rate: Option<String>) -> SplitPolicy {
    let currency = currency.map(|s| s.trim().to_ascii_lowercase()).filter(|s| !s.is_empty()).unwrap_or_else(|| {
        info!("🪛️ MKT_CURRENCY is not set. Using the default, {DEFAULT_CURRENCY_CODE}.");
        DEFAULT_CURRENCY_CODE.to_string()
    });
    let max_commission_rate = match max_rate {
        None => {
            info!("🪛️ MKT_MAX_COMMISSION_RATE is not set. Using the default, {DEFAULT_MAX_COMMISSION_RATE}.");
            DEFAULT_MAX_COMMISSION_RATE
        },
        Some(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|e| e.to_string())
            .and_then(|pct| CommissionRate::from_percent(pct).map_err(|e| e.to_string()))
            .unwrap_or_else(|e| {
                warn!(
                    "🪛️ Invalid configuration value for MKT_MAX_COMMISSION_RATE ({s}). {e} Using the default, \
                     {DEFAULT_MAX_COMMISSION_RATE}."
                );
                DEFAULT_MAX_COMMISSION_RATE
            }),
    };
    SplitPolicy { max_commission_rate, currency }
}

/// Settings for the stale order reconciler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReconcilerConfig {
    /// Unpaid card orders older than this are cancelled. `None` disables the reconciler.
    pub pending_threshold: Option<Duration>,
    pub check_interval: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            pending_threshold: Some(Duration::minutes(DEFAULT_AUTO_CANCEL_PENDING_MINUTES)),
            check_interval: Duration::minutes(DEFAULT_AUTO_CANCEL_CHECK_INTERVAL_MINUTES),
        }
    }
}

impl ReconcilerConfig {
    /// Builds the reconciler settings from raw minute values. Missing or unparseable values fall back to the defaults.
    pub fn from_values(pending_minutes: Option<String>, interval_minutes: Option<String>) -> Self {
        let pending = parse_minutes("MKT_ORDER_AUTO_CANCEL_PENDING_MINUTES", pending_minutes)
            .unwrap_or(DEFAULT_AUTO_CANCEL_PENDING_MINUTES);
        let pending_threshold = if pending == 0 {
            info!("🪛️ MKT_ORDER_AUTO_CANCEL_PENDING_MINUTES is 0. Stale orders will not be cancelled automatically.");
            None
        } else {
            Some(Duration::minutes(pending))
        };
        let mut interval = parse_minutes("MKT_ORDER_AUTO_CANCEL_CHECK_INTERVAL_MINUTES", interval_minutes)
            .unwrap_or(DEFAULT_AUTO_CANCEL_CHECK_INTERVAL_MINUTES);
        if interval < MIN_AUTO_CANCEL_CHECK_INTERVAL_MINUTES {
            warn!(
                "🪛️ MKT_ORDER_AUTO_CANCEL_CHECK_INTERVAL_MINUTES must be at least \
                 {MIN_AUTO_CANCEL_CHECK_INTERVAL_MINUTES}. Using {MIN_AUTO_CANCEL_CHECK_INTERVAL_MINUTES} instead of \
                 {interval}."
            );
            interval = MIN_AUTO_CANCEL_CHECK_INTERVAL_MINUTES;
        }
        Self { pending_threshold, check_interval: Duration::minutes(interval) }
    }

    pub fn is_enabled(&self) -> bool {
        self.pending_threshold.is_some()
    }
}

fn parse_minutes(name: &str, value: Option<String>) -> Option<i64> {
    let Some(s) = value else {
        info!("🪛️ {name} is not set. Using the default value.");
        return None;
    };
    s.trim()
        .parse::<u32>()
        .map(i64::from)
        .map_err(|e| warn!("🪛️ Invalid configuration value for {name} ({s}). {e}. Using the default value."))
        .ok()
}
