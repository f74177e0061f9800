mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use common::{gateway_order, TestApp, CLIENT_SECRET};
use order_payment_service::models::{GatewayEnvironment, OrderStatus, PaymentStatus};
use order_payment_service::services::webhook::compute_signature;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

const GATEWAY_ORDER_ID: &str = "ord_8000123456_3f2b8c1e9d4a4e6b8f00";
const TIMESTAMP: &str = "1718000123";

fn webhook_body(gateway_order_id: &str) -> String {
    json!({
        "type": "PAYMENT_SUCCESS_WEBHOOK",
        "event_time": "2024-06-10T12:15:23+05:30",
        "data": {
            "order": { "order_id": gateway_order_id, "order_amount": 150.0 },
            "payment": { "payment_status": "SUCCESS" }
        }
    })
    .to_string()
}

fn webhook_request(body: &str, signature: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/payment-webhook")
        .header("content-type", "application/json");
    if let Some(signature) = signature {
        builder = builder
            .header("x-webhook-timestamp", TIMESTAMP)
            .header("x-webhook-signature", signature);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

#[tokio::test]
async fn signed_webhook_triggers_gateway_verification() {
    let app = TestApp::spawn().await;
    app.configure_gateway(GatewayEnvironment::Sandbox);
    let order = app.seed_order(PaymentStatus::Pending, Some(GATEWAY_ORDER_ID)).await;

    Mock::given(method("GET"))
        .and(path(format!("/pg/orders/{}", GATEWAY_ORDER_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(gateway_order(GATEWAY_ORDER_ID, "PAID")))
        .expect(1)
        .mount(&app.gateway)
        .await;

    let body = webhook_body(GATEWAY_ORDER_ID);
    let signature = compute_signature(TIMESTAMP, body.as_bytes(), CLIENT_SECRET);

    let (status, response) = app.request(webhook_request(&body, Some(&signature))).await;

    assert_eq!(status, StatusCode::OK, "response: {}", response);
    assert_eq!(response["received"], true);
    assert_eq!(response["payment_status"], "completed");

    let stored = app.stored_order(&order.id).await;
    assert_eq!(stored.payment_status, PaymentStatus::Completed);
    assert_eq!(stored.status, OrderStatus::Confirmed);
}

#[tokio::test]
async fn payload_status_is_not_trusted() {
    let app = TestApp::spawn().await;
    app.configure_gateway(GatewayEnvironment::Sandbox);
    let order = app.seed_order(PaymentStatus::Pending, Some(GATEWAY_ORDER_ID)).await;

    Mock::given(method("GET"))
        .and(path(format!("/pg/orders/{}", GATEWAY_ORDER_ID)))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(gateway_order(GATEWAY_ORDER_ID, "ACTIVE")),
        )
        .expect(1)
        .mount(&app.gateway)
        .await;

    let body = webhook_body(GATEWAY_ORDER_ID);
    let signature = compute_signature(TIMESTAMP, body.as_bytes(), CLIENT_SECRET);

    let (status, response) = app.request(webhook_request(&body, Some(&signature))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["payment_status"], "pending");
    assert_eq!(app.stored_order(&order.id).await, order);
}

#[tokio::test]
async fn missing_or_invalid_signatures_are_unauthorized() {
    let app = TestApp::spawn().await;
    app.configure_gateway(GatewayEnvironment::Sandbox);
    let order = app.seed_order(PaymentStatus::Pending, Some(GATEWAY_ORDER_ID)).await;
    let body = webhook_body(GATEWAY_ORDER_ID);

    let (status, _) = app.request(webhook_request(&body, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let forged = compute_signature(TIMESTAMP, body.as_bytes(), "not-the-secret");
    let (status, _) = app.request(webhook_request(&body, Some(&forged))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    assert_eq!(app.stored_order(&order.id).await, order);
    assert_eq!(app.gateway_calls().await, 0);
}

#[tokio::test]
async fn signed_webhook_for_unknown_order_is_acknowledged() {
    let app = TestApp::spawn().await;
    app.configure_gateway(GatewayEnvironment::Sandbox);

    let body = webhook_body("ord_0000000000_ffffffffffffffffffff");
    let signature = compute_signature(TIMESTAMP, body.as_bytes(), CLIENT_SECRET);
    let (status, response) = app.request(webhook_request(&body, Some(&signature))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["received"], true);
    assert_eq!(app.gateway_calls().await, 0);
}

#[tokio::test]
async fn unsigned_webhook_is_refused_whether_or_not_the_order_exists() {
    let app = TestApp::spawn().await;
    app.configure_gateway(GatewayEnvironment::Sandbox);
    app.seed_order(PaymentStatus::Pending, Some(GATEWAY_ORDER_ID)).await;

    let known = webhook_body(GATEWAY_ORDER_ID);
    let unknown = webhook_body("ord_0000000000_ffffffffffffffffffff");

    let (known_status, known_body) = app.request(webhook_request(&known, None)).await;
    let (unknown_status, unknown_body) = app.request(webhook_request(&unknown, None)).await;

    assert_eq!(known_status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_status, StatusCode::UNAUTHORIZED);
    assert_eq!(known_body, unknown_body);
    assert_eq!(app.gateway_calls().await, 0);
}

#[tokio::test]
async fn malformed_payload_is_rejected() {
    let app = TestApp::spawn().await;

    let (status, _) = app
        .request(webhook_request(r#"{"data":{"payment":{}}}"#, None))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}
