mod common;

use axum::http::StatusCode;
use common::{gateway_order, TestApp, CLIENT_ID, CLIENT_SECRET};
use order_payment_service::config::CallbackConfig;
use order_payment_service::models::{
    GatewayCredentials, GatewayEnvironment, OrderStatus, PaymentStatus, TransactionStatus,
};
use order_payment_service::services::repository::TransactionRepository;
use serde_json::{json, Value};
use uuid::Uuid;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, ResponseTemplate};

fn is_gateway_safe(id: &str) -> bool {
    !id.is_empty() && id.len() <= 50 && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[tokio::test]
async fn restaurant_without_credentials_takes_offline_order() {
    let app = TestApp::spawn().await;

    let (status, body) = app.post_json("/api/create-payment", app.order_body()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["payment_configured"], false);
    assert_eq!(
        body["message"],
        "Order placed successfully! The restaurant will process payment manually."
    );

    let order_id: Uuid = body["order_id"].as_str().unwrap().parse().unwrap();
    assert_eq!(
        body["redirect_url"],
        format!("/payment/success?order_id={}&no_payment=true", order_id)
    );

    let order = app.stored_order(&order_id).await;
    assert_eq!(order.payment_status, PaymentStatus::NotConfigured);
    assert_eq!(order.status, OrderStatus::Pending);
    assert!(order.payment_gateway_order_id.is_none());
    assert!(app.store.transactions().is_empty());
    assert_eq!(app.gateway_calls().await, 0);
}

#[tokio::test]
async fn credential_store_failure_degrades_to_offline() {
    let app = TestApp::spawn().await;
    app.configure_gateway(GatewayEnvironment::Sandbox);
    app.store.set_credentials_unavailable(true);

    let (status, body) = app.post_json("/api/create-payment", app.order_body()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["payment_configured"], false);
    assert_eq!(app.gateway_calls().await, 0);
}

#[tokio::test]
async fn unknown_restaurant_is_not_found() {
    let app = TestApp::spawn().await;
    let mut body = app.order_body();
    body["restaurant_id"] = json!(Uuid::new_v4().to_string());

    let (status, body) = app.post_json("/api/create-payment", body).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Restaurant not found");
    assert!(app.store.orders().is_empty());
}

#[tokio::test]
async fn inactive_restaurant_is_rejected() {
    let app = TestApp::spawn().await;
    app.store.add_restaurant(app.restaurant_id, "Dosa Corner", "suspended");

    let (status, _) = app.post_json("/api/create-payment", app.order_body()).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(app.store.orders().is_empty());
}

#[tokio::test]
async fn invalid_requests_are_rejected_before_any_write() {
    let app = TestApp::spawn().await;

    let mut missing_name = app.order_body();
    missing_name.as_object_mut().unwrap().remove("customer_name");

    let mut no_items = app.order_body();
    no_items["items"] = json!([]);

    let mut wrong_total = app.order_body();
    wrong_total["total_amount"] = json!(149);

    let mut bad_restaurant = app.order_body();
    bad_restaurant["restaurant_id"] = json!("not-a-uuid");

    for body in [missing_name, no_items, wrong_total, bad_restaurant] {
        let (status, response) = app.post_json("/api/create-payment", body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "response: {}", response);
    }

    let (status, _) = app
        .request(
            axum::http::Request::builder()
                .method("POST")
                .uri("/api/create-payment")
                .header("content-type", "application/json")
                .body(axum::body::Body::from("{not json"))
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert!(app.store.orders().is_empty());
}

#[tokio::test]
async fn gateway_success_links_order_and_records_one_transaction() {
    let app = TestApp::spawn().await;
    app.configure_gateway(GatewayEnvironment::Sandbox);

    Mock::given(method("POST"))
        .and(path("/pg/orders"))
        .and(header("x-client-id", CLIENT_ID))
        .and(header("x-client-secret", CLIENT_SECRET))
        .and(header("x-api-version", "2022-09-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(gateway_order("ord_x", "ACTIVE")))
        .expect(1)
        .mount(&app.gateway)
        .await;

    let (status, body) = app.post_json("/api/create-payment", app.order_body()).await;

    assert_eq!(status, StatusCode::OK, "response: {}", body);
    assert_eq!(body["success"], true);
    assert_eq!(body["payment_session_id"], "session_abc123");
    assert_eq!(body["environment"], "sandbox");

    let order_id: Uuid = body["order_id"].as_str().unwrap().parse().unwrap();
    let gateway_order_id = body["cashfree_order_id"].as_str().unwrap().to_string();
    assert!(is_gateway_safe(&gateway_order_id));
    assert!(gateway_order_id.ends_with(&order_id.simple().to_string()[..20]));

    let order = app.stored_order(&order_id).await;
    assert_eq!(order.payment_status, PaymentStatus::Pending);
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.payment_gateway_order_id.as_deref(), Some(gateway_order_id.as_str()));

    let transactions = app
        .store
        .list_for_order(order_id)
        .await
        .expect("Failed to list transactions");
    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0].order_id, order_id);
    assert_eq!(transactions[0].payment_gateway, "cashfree");
    assert_eq!(transactions[0].gateway_order_id, gateway_order_id);
    assert_eq!(transactions[0].currency, "INR");
    assert_eq!(transactions[0].status, TransactionStatus::Pending);
    assert_eq!(transactions[0].gateway_response["cf_order_id"], 2149460581u64);

    let requests = app.gateway.received_requests().await.unwrap();
    let sent: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(sent["order_id"], gateway_order_id);
    assert_eq!(sent["order_amount"], json!(150.0));
    assert_eq!(sent["order_currency"], "INR");
    assert_eq!(sent["customer_details"]["customer_phone"], "919876543210");
    assert_eq!(
        sent["customer_details"]["customer_email"],
        "919876543210@servenow.app"
    );
    assert!(sent["customer_details"]["customer_id"]
        .as_str()
        .unwrap()
        .starts_with("cust_"));
    assert_eq!(
        sent["order_meta"]["return_url"],
        format!("http://localhost:3000/payment/success?order_id={}", order_id)
    );
    assert_eq!(
        sent["order_meta"]["notify_url"],
        "http://localhost:3000/api/payment-webhook"
    );
}

#[tokio::test]
async fn gateway_rejection_fails_the_order_and_returns_raw_body() {
    let app = TestApp::spawn().await;
    app.configure_gateway(GatewayEnvironment::Sandbox);

    let rejection = json!({
        "message": "authentication Failed",
        "code": "request_failed",
        "type": "authentication_error"
    });
    Mock::given(method("POST"))
        .and(path("/pg/orders"))
        .respond_with(ResponseTemplate::new(401).set_body_json(rejection.clone()))
        .expect(1)
        .mount(&app.gateway)
        .await;

    let (status, body) = app.post_json("/api/create-payment", app.order_body()).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Failed to create payment");
    assert!(body["details"]
        .as_str()
        .unwrap()
        .contains("authentication Failed"));

    let orders = app.store.orders();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].payment_status, PaymentStatus::Failed);
    assert_eq!(orders[0].payment_error.as_ref(), Some(&rejection));
    assert!(app.store.transactions().is_empty());
}

#[tokio::test]
async fn incomplete_credentials_fail_the_order_without_gateway_call() {
    let app = TestApp::spawn().await;
    app.store.set_credentials(
        app.restaurant_id,
        GatewayCredentials::new(CLIENT_ID, "", GatewayEnvironment::Sandbox),
    );

    Mock::given(method("POST"))
        .and(path("/pg/orders"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&app.gateway)
        .await;

    let (status, body) = app.post_json("/api/create-payment", app.order_body()).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Failed to create payment");

    let orders = app.store.orders();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].payment_status, PaymentStatus::Failed);
    assert_eq!(
        orders[0].payment_error,
        Some(json!({ "message": "Invalid payment credentials" }))
    );
}

#[tokio::test]
async fn production_callbacks_replace_localhost_with_https_placeholder() {
    let app = TestApp::spawn().await;
    app.configure_gateway(GatewayEnvironment::Production);

    Mock::given(method("POST"))
        .and(path("/pg/orders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(gateway_order("ord_x", "ACTIVE")))
        .expect(1)
        .mount(&app.gateway)
        .await;

    let (status, body) = app.post_json("/api/create-payment", app.order_body()).await;
    assert_eq!(status, StatusCode::OK, "response: {}", body);
    assert_eq!(body["environment"], "production");

    let requests = app.gateway.received_requests().await.unwrap();
    let sent: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(
        sent["order_meta"]["notify_url"],
        "https://example.com/api/payment-webhook"
    );
}

#[tokio::test]
async fn insecure_production_callback_fails_fast() {
    let app = TestApp::spawn_with_callbacks(CallbackConfig {
        app_url: "ftp://orders.servenow.app".to_string(),
        ..CallbackConfig::default()
    })
    .await;
    app.configure_gateway(GatewayEnvironment::Production);

    Mock::given(method("POST"))
        .and(path("/pg/orders"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&app.gateway)
        .await;

    let (status, _) = app.post_json("/api/create-payment", app.order_body()).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let orders = app.store.orders();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].payment_status, PaymentStatus::Failed);
}

#[tokio::test]
async fn unreadable_gateway_response_marks_order_failed() {
    let app = TestApp::spawn().await;
    app.configure_gateway(GatewayEnvironment::Sandbox);

    Mock::given(method("POST"))
        .and(path("/pg/orders"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>upstream error</html>"))
        .mount(&app.gateway)
        .await;

    let (status, _) = app.post_json("/api/create-payment", app.order_body()).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let orders = app.store.orders();
    assert_eq!(orders[0].payment_status, PaymentStatus::Failed);
    assert!(orders[0].payment_error.as_ref().unwrap()["message"].is_string());
}
