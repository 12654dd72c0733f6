use std::time::Duration;

use actix_web::{
    dev::Server,
    http::KeepAlive,
    middleware::Logger,
    web,
    web::ServiceConfig,
    App,
    HttpServer,
};
use log::*;
use marketplace_engine::{MarketplaceDatabase, PaymentApi, PaymentProcessor, SqliteDatabase};
use stripe_tools::{StripeApi, StripeConfig};

use crate::{
    config::ServerConfig,
    errors::ServerError,
    integrations::stripe::StripeProcessor,
    lifecycle::Marketplace,
    routes::{health, ProcessorWebhookRoute},
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let marketplace = Marketplace::start(&config).await?;
    let stripe = StripeApi::new(config.stripe.clone()).map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let payments = marketplace.payments(StripeProcessor::new(stripe));
    let result = match create_server_instance(config, payments) {
        Ok(srv) => srv.await.map_err(|e| ServerError::Unspecified(e.to_string())),
        Err(e) => Err(e),
    };
    marketplace.shutdown().await;
    result
}

pub fn create_server_instance(
    config: ServerConfig,
    payments: PaymentApi<SqliteDatabase, StripeProcessor>,
) -> Result<Server, ServerError> {
    let stripe_config = config.stripe.clone();
    let srv = HttpServer::new(move || {
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("mkt::access_log"))
            .configure(configure_routes::<SqliteDatabase, StripeProcessor>(payments.clone(), stripe_config.clone()))
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    info!("🚀️ Marketplace server listening on {}:{}", config.host, config.port);
    Ok(srv)
}

/// Registers the app data and every route of the marketplace on an actix app.
pub fn configure_routes<B, P>(
    payments: PaymentApi<B, P>,
    stripe_config: StripeConfig,
) -> impl FnOnce(&mut ServiceConfig)
where
    B: MarketplaceDatabase + 'static,
    P: PaymentProcessor + 'static,
{
    move |cfg| {
        cfg.app_data(web::Data::new(payments))
            .app_data(web::Data::new(stripe_config))
            .service(health)
            .service(web::scope("/processor").service(ProcessorWebhookRoute::<B, P>::new()));
    }
}
