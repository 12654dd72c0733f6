use actix_web::{body::MessageBody, http::StatusCode, test, test::TestRequest, App};
use chrono::Utc;
use log::debug;
use marketplace_engine::{
    test_utils::{
        fake_processor::FakeProcessor,
        prepare_env::{prepare_test_env, random_db_path},
        seed::seed_catalog,
    },
    OrderFlowApi,
    PaymentApi,
    SqliteDatabase,
};
use mkt_common::Secret;
use stripe_tools::{compute_signature, StripeConfig};

use crate::{routes::SIGNATURE_HEADER, server::configure_routes};

pub const WEBHOOK_SECRET: &str = "whsec_test_only_do_not_use";

pub fn stripe_config() -> StripeConfig {
    StripeConfig { webhook_secret: Secret::new(WEBHOOK_SECRET.to_string()), ..Default::default() }
}

pub async fn payments_api() -> PaymentApi<SqliteDatabase, FakeProcessor> {
    let db = prepare_test_env(&random_db_path()).await;
    seed_catalog(&db).await;
    PaymentApi::new(OrderFlowApi::new(db, Default::default()), FakeProcessor::new())
}

/// A signature header for `payload`, signed now with the test secret.
pub fn sign(payload: &str) -> String {
    let ts = Utc::now().timestamp();
    let sig = compute_signature(WEBHOOK_SECRET, ts, payload.as_bytes()).expect("Failed to sign payload");
    format!("t={ts},v1={sig}")
}

pub async fn post_webhook(
    api: PaymentApi<SqliteDatabase, FakeProcessor>,
    signature: Option<String>,
    payload: &str,
) -> Result<(StatusCode, String), String> {
    let mut req = TestRequest::post().uri("/processor/webhook").set_payload(payload.to_string());
    if let Some(signature) = signature {
        req = req.insert_header((SIGNATURE_HEADER, signature));
    }
    let app = App::new().configure(configure_routes(api, stripe_config()));
    let service = test::init_service(app).await;
    debug!("Making request");
    let (_, res) = test::try_call_service(&service, req.to_request()).await.map_err(|e| e.to_string())?.into_parts();
    let status = res.status();
    let body = String::from_utf8_lossy(&res.into_body().try_into_bytes().unwrap()).into_owned();
    Ok((status, body))
}

pub async fn get_request(path: &str) -> Result<(StatusCode, String), String> {
    let api = payments_api().await;
    let app = App::new().configure(configure_routes(api, stripe_config()));
    let service = test::init_service(app).await;
    let (_, res) = test::try_call_service(&service, TestRequest::get().uri(path).to_request())
        .await
        .map_err(|e| e.to_string())?
        .into_parts();
    let status = res.status();
    let body = String::from_utf8_lossy(&res.into_body().try_into_bytes().unwrap()).into_owned();
    Ok((status, body))
}
