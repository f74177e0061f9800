#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use order_payment_service::config::{CallbackConfig, CashfreeConfig};
use order_payment_service::models::{
    GatewayCredentials, GatewayEnvironment, LineItem, NewOrder, Order, PaymentStatus,
};
use order_payment_service::services::repository::OrderRepository;
use order_payment_service::services::{InMemoryStore, Repositories};
use order_payment_service::{build_router, AppState};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::MockServer;

pub const CLIENT_ID: &str = "cf_test_app_id";
pub const CLIENT_SECRET: &str = "cf_test_secret";

pub struct TestApp {
    pub router: Router,
    pub store: Arc<InMemoryStore>,
    pub gateway: MockServer,
    pub restaurant_id: Uuid,
}

impl TestApp {
    /// Router over an in-memory store with one active restaurant and a mock
    /// gateway serving both environments.
    pub async fn spawn() -> Self {
        Self::spawn_with_callbacks(CallbackConfig::default()).await
    }

    pub async fn spawn_with_callbacks(callbacks: CallbackConfig) -> Self {
        let gateway = MockServer::start().await;
        let store = Arc::new(InMemoryStore::new());
        let restaurant_id = Uuid::new_v4();
        store.add_restaurant(restaurant_id, "Dosa Corner", "active");

        let cashfree = CashfreeConfig {
            production_base_url: gateway.uri(),
            sandbox_base_url: gateway.uri(),
            timeout_secs: 5,
            ..CashfreeConfig::default()
        };

        let state = AppState::new(Repositories::from_store(store.clone()), cashfree, callbacks, None)
            .expect("Failed to build app state");

        Self {
            router: build_router(state),
            store,
            gateway,
            restaurant_id,
        }
    }

    pub fn configure_gateway(&self, environment: GatewayEnvironment) {
        self.store.set_credentials(
            self.restaurant_id,
            GatewayCredentials::new(CLIENT_ID, CLIENT_SECRET, environment),
        );
    }

    pub async fn request(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to execute request");

        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to read body")
            .to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    pub async fn post_json(&self, path: &str, body: Value) -> (StatusCode, Value) {
        self.request(
            Request::builder()
                .method("POST")
                .uri(path)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn get(&self, path: &str) -> (StatusCode, Value) {
        self.request(Request::builder().uri(path).body(Body::empty()).unwrap())
            .await
    }

    pub async fn verify(&self, order_id: &Uuid) -> (StatusCode, Value) {
        self.post_json("/api/verify-payment", json!({ "orderId": order_id.to_string() }))
            .await
    }

    pub fn order_body(&self) -> Value {
        json!({
            "restaurant_id": self.restaurant_id.to_string(),
            "customer_name": "Asha Rao",
            "customer_phone": "+91 98765-43210",
            "table_number": "T4",
            "items": [
                { "id": "m1", "name": "Masala Dosa", "quantity": 2, "price": 60, "total": 120 },
                { "id": "m2", "name": "Filter Coffee", "quantity": 1, "price": 30, "total": 30 }
            ],
            "total_amount": 150
        })
    }

    /// Stores an order directly, bypassing initiation.
    pub async fn seed_order(
        &self,
        payment_status: PaymentStatus,
        gateway_order_id: Option<&str>,
    ) -> Order {
        let order = self
            .store
            .create_order(NewOrder {
                restaurant_id: self.restaurant_id,
                customer_name: "Asha Rao".to_string(),
                customer_phone: "9876543210".to_string(),
                table_number: "T4".to_string(),
                items: vec![LineItem {
                    id: "m1".to_string(),
                    name: "Masala Dosa".to_string(),
                    quantity: 1,
                    unit_price: Decimal::new(150, 0),
                    line_total: Decimal::new(150, 0),
                }],
                total_amount: Decimal::new(150, 0),
                payment_status,
            })
            .await
            .expect("Failed to seed order");

        if let Some(gateway_order_id) = gateway_order_id {
            self.store
                .attach_gateway_order(order.id, gateway_order_id)
                .await
                .expect("Failed to attach gateway order");
        }

        self.stored_order(&order.id).await
    }

    pub async fn stored_order(&self, id: &Uuid) -> Order {
        self.store
            .get_order(*id)
            .await
            .expect("Failed to read order")
            .expect("Order missing")
    }

    pub async fn gateway_calls(&self) -> usize {
        self.gateway
            .received_requests()
            .await
            .map(|requests| requests.len())
            .unwrap_or_default()
    }
}

pub fn gateway_order(order_id: &str, order_status: &str) -> Value {
    json!({
        "cf_order_id": 2149460581u64,
        "order_id": order_id,
        "order_status": order_status,
        "order_amount": 150.0,
        "order_currency": "INR",
        "payment_session_id": "session_abc123"
    })
}
