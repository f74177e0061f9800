//! Cashfree payment gateway client.
//!
//! Implements the PG Orders API: order creation to open a hosted checkout
//! session, and order lookup to read the authoritative payment status.

use crate::config::CashfreeConfig;
use crate::models::{GatewayCredentials, GatewayEnvironment};
use crate::services::metrics::record_gateway_call;
use reqwest::{Client, RequestBuilder, Response};
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

/// Cashfree client shared by initiation and verification.
#[derive(Clone)]
pub struct CashfreeClient {
    client: Client,
    config: CashfreeConfig,
}

/// Request body for `POST /pg/orders`.
#[derive(Debug, Serialize)]
pub struct CreateOrderRequest {
    pub order_id: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub order_amount: Decimal,
    pub order_currency: String,
    pub customer_details: CustomerDetails,
    pub order_meta: OrderMeta,
}

#[derive(Debug, Serialize)]
pub struct CustomerDetails {
    pub customer_id: String,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
}

#[derive(Debug, Serialize)]
pub struct OrderMeta {
    pub return_url: String,
    pub notify_url: String,
}

/// Order entity returned by the gateway.
#[derive(Debug, Clone, Deserialize)]
pub struct CashfreeOrder {
    pub order_id: String,
    pub payment_session_id: Option<String>,
    pub order_status: Option<String>,
}

/// A created order together with the raw response kept for auditing.
#[derive(Debug, Clone)]
pub struct CreatedOrder {
    pub order: CashfreeOrder,
    pub raw: serde_json::Value,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Cashfree API error {status}: {body}")]
    Rejected { status: u16, body: serde_json::Value },

    #[error("Cashfree request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Unexpected Cashfree response: {0}")]
    Decode(String),
}

impl GatewayError {
    /// Structured payload persisted as the order's `payment_error`.
    pub fn snapshot(&self) -> serde_json::Value {
        match self {
            Self::Rejected { body, .. } => body.clone(),
            other => json!({ "message": other.to_string() }),
        }
    }

    /// Raw text surfaced to the caller for support diagnosis.
    pub fn details(&self) -> String {
        match self {
            Self::Rejected { body, .. } => body.to_string(),
            other => other.to_string(),
        }
    }
}

impl CashfreeClient {
    pub fn new(config: CashfreeConfig) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    pub fn currency(&self) -> &str {
        &self.config.currency
    }

    /// Base URL for the credentials' environment.
    pub fn base_url(&self, environment: GatewayEnvironment) -> &str {
        match environment {
            GatewayEnvironment::Production => &self.config.production_base_url,
            GatewayEnvironment::Sandbox => &self.config.sandbox_base_url,
        }
    }

    fn authorized(&self, request: RequestBuilder, credentials: &GatewayCredentials) -> RequestBuilder {
        request
            .header("Accept", "application/json")
            .header("x-client-id", credentials.client_id.trim())
            .header("x-client-secret", credentials.client_secret.expose_secret().trim())
            .header("x-api-version", &self.config.api_version)
    }

    /// Opens a payment session for `request`.
    pub async fn create_order(
        &self,
        credentials: &GatewayCredentials,
        request: &CreateOrderRequest,
    ) -> Result<CreatedOrder, GatewayError> {
        let url = format!("{}/pg/orders", self.base_url(credentials.environment));

        tracing::info!(
            url = %url,
            order_id = %request.order_id,
            environment = %credentials.environment,
            "Creating Cashfree order"
        );

        let result = self
            .authorized(self.client.post(&url), credentials)
            .json(request)
            .send()
            .await;
        let response = match result {
            Ok(response) => response,
            Err(e) => {
                record_gateway_call("create_order", "transport_error");
                return Err(e.into());
            }
        };

        let raw = read_json("create_order", response).await?;
        let order: CashfreeOrder = serde_json::from_value(raw.clone())
            .map_err(|e| GatewayError::Decode(e.to_string()))?;

        tracing::info!(
            order_id = %order.order_id,
            has_session = order.payment_session_id.is_some(),
            "Cashfree order created"
        );

        Ok(CreatedOrder { order, raw })
    }

    /// Fetches the current state of a gateway order.
    pub async fn get_order(
        &self,
        credentials: &GatewayCredentials,
        gateway_order_id: &str,
    ) -> Result<CashfreeOrder, GatewayError> {
        let url = format!(
            "{}/pg/orders/{}",
            self.base_url(credentials.environment),
            gateway_order_id
        );

        let result = self.authorized(self.client.get(&url), credentials).send().await;
        let response = match result {
            Ok(response) => response,
            Err(e) => {
                record_gateway_call("get_order", "transport_error");
                return Err(e.into());
            }
        };

        let raw = read_json("get_order", response).await?;
        serde_json::from_value(raw).map_err(|e| GatewayError::Decode(e.to_string()))
    }
}

/// Reads a gateway response, turning non-2xx statuses into `Rejected`.
async fn read_json(operation: &str, response: Response) -> Result<serde_json::Value, GatewayError> {
    let status = response.status();
    let body = response.text().await?;

    tracing::debug!(operation = operation, status = %status, "Cashfree response received");

    if status.is_success() {
        record_gateway_call(operation, "success");
        serde_json::from_str(&body).map_err(|e| GatewayError::Decode(e.to_string()))
    } else {
        record_gateway_call(operation, "rejected");
        let body = serde_json::from_str(&body).unwrap_or_else(|_| json!({ "message": body }));
        tracing::error!(
            operation = operation,
            status = %status,
            body = %body,
            "Cashfree request rejected"
        );
        Err(GatewayError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}
