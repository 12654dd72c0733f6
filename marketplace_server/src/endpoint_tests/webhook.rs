use actix_web::http::StatusCode;
use marketplace_engine::{
    db_types::{Checkout, Order, OrderStatus, PaymentMethod, PaymentStatus},
    test_utils::{fake_processor::FakeProcessor, seed::address},
    PaymentApi,
    SqliteDatabase,
};
use serde_json::json;

use super::helpers::{get_request, payments_api, post_webhook, sign};

fn paid_session_event(order: &Order) -> String {
    json!({
        "id": "evt_session",
        "type": "checkout.session.completed",
        "created": 1_717_243_200,
        "data": { "object": {
            "id": "cs_test_a1",
            "payment_intent": "pi_a1",
            "payment_status": "paid",
            "metadata": { "order_id": order.id.value().to_string() },
            "customer_email": "buyer@example.com"
        }}
    })
    .to_string()
}

async fn card_order(api: &PaymentApi<SqliteDatabase, FakeProcessor>) -> Order {
    let checkout = Checkout::new("buyer1", address(), PaymentMethod::Card).with_item("lamp", 1).with_item("novel", 1);
    api.flow().create_order(checkout).await.expect("checkout")
}

#[actix_web::test]
async fn health_check() {
    let (status, body) = get_request("/health").await.expect("Failed to make request");
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("👍️"));
}

#[actix_web::test]
async fn signed_session_event_pays_the_order() {
    let api = payments_api().await;
    let order = card_order(&api).await;
    let payload = paid_session_event(&order);
    let (status, body) =
        post_webhook(api.clone(), Some(sign(&payload)), &payload).await.expect("Failed to make request");
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(body.contains(r#""handled":true"#));

    let order = api.flow().fetch_order(order.id).await.unwrap().unwrap();
    assert_eq!(order.payment_status, PaymentStatus::Paid);
    assert_eq!(order.order_status, OrderStatus::Processing);
    let result = order.payment_result.expect("payment result");
    assert_eq!(result.id, "pi_a1");
    assert_eq!(result.email.as_deref(), Some("buyer@example.com"));

    // Redelivery is acknowledged without changing anything
    let (status, body) = post_webhook(api.clone(), Some(sign(&payload)), &payload).await.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""handled":false"#));
}

#[actix_web::test]
async fn bad_signatures_are_rejected() {
    let api = payments_api().await;
    let order = card_order(&api).await;
    let payload = paid_session_event(&order);
    let forged = sign(r#"{"id":"evt_other"}"#);

    let (status, body) = post_webhook(api.clone(), Some(forged), &payload).await.unwrap();
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("signature"));

    let (status, _) = post_webhook(api.clone(), None, &payload).await.unwrap();
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let order = api.flow().fetch_order(order.id).await.unwrap().unwrap();
    assert_eq!(order.payment_status, PaymentStatus::Pending);
}

#[actix_web::test]
async fn unknown_events_and_orders_are_acknowledged() {
    let api = payments_api().await;
    let payload = json!({
        "id": "evt_refund",
        "type": "charge.refunded",
        "created": 1_717_243_200,
        "data": { "object": { "id": "ch_1" } }
    })
    .to_string();
    let (status, body) = post_webhook(api.clone(), Some(sign(&payload)), &payload).await.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("charge.refunded"));

    let payload = json!({
        "id": "evt_ghost",
        "type": "payment_intent.succeeded",
        "created": 1_717_243_200,
        "data": { "object": {
            "id": "pi_ghost", "amount": 500, "currency": "usd", "status": "succeeded", "metadata": { "order_id": "9999" }
        }}
    })
    .to_string();
    let (status, body) = post_webhook(api, Some(sign(&payload)), &payload).await.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("ignored"));
}

#[actix_web::test]
async fn failed_intents_mark_the_payment_failed() {
    let api = payments_api().await;
    let order = card_order(&api).await;
    let payload = json!({
        "id": "evt_fail",
        "type": "payment_intent.payment_failed",
        "created": 1_717_243_200,
        "data": { "object": {
            "id": "pi_f", "amount": 7050, "currency": "usd", "status": "requires_payment_method",
            "metadata": { "order_id": order.id.value().to_string() }
        }}
    })
    .to_string();
    let (status, _) = post_webhook(api.clone(), Some(sign(&payload)), &payload).await.unwrap();
    assert_eq!(status, StatusCode::OK);
    let order = api.flow().fetch_order(order.id).await.unwrap().unwrap();
    assert_eq!(order.payment_status, PaymentStatus::Failed);
    assert_eq!(order.order_status, OrderStatus::Pending);
}

#[actix_web::test]
async fn malformed_payloads_are_rejected() {
    let api = payments_api().await;
    let payload = r#"{"id": "evt_broken", "type": "payment_intent.succeeded"}"#;
    let (status, body) = post_webhook(api, Some(sign(payload)), payload).await.unwrap();
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("error"));
}
