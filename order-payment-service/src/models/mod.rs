//! Domain models for order-payment-service.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Order Models
// ============================================================================

/// Fulfillment status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
        }
    }
}

impl FromStr for OrderStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "cancelled" => Ok(Self::Cancelled),
            "completed" => Ok(Self::Completed),
            other => Err(anyhow::anyhow!("Unknown order status: {}", other)),
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment status of an order.
///
/// `not_configured` orders are settled offline and never reach the gateway.
/// `completed` and `failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    NotConfigured,
    Pending,
    Completed,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotConfigured => "not_configured",
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Only a pending payment is still owned by the gateway.
    pub fn awaits_gateway(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

impl FromStr for PaymentStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_configured" => Ok(Self::NotConfigured),
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(anyhow::anyhow!("Unknown payment status: {}", other)),
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of a customer's cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: String,
    pub name: String,
    pub quantity: u32,
    #[serde(alias = "price", with = "rust_decimal::serde::float")]
    pub unit_price: Decimal,
    #[serde(alias = "total", with = "rust_decimal::serde::float")]
    pub line_total: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub restaurant_id: Uuid,
    pub customer_name: String,
    pub customer_phone: String,
    pub table_number: String,
    pub items: Vec<LineItem>,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_amount: Decimal,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_gateway_order_id: Option<String>,
    pub payment_error: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied when an order is first recorded.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub restaurant_id: Uuid,
    pub customer_name: String,
    pub customer_phone: String,
    pub table_number: String,
    pub items: Vec<LineItem>,
    pub total_amount: Decimal,
    pub payment_status: PaymentStatus,
}

// ============================================================================
// Transaction Models
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl FromStr for TransactionStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(anyhow::anyhow!("Unknown transaction status: {}", other)),
        }
    }
}

/// Append-only record of one gateway attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub restaurant_id: Uuid,
    pub order_id: Uuid,
    pub payment_gateway: String,
    pub gateway_order_id: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub currency: String,
    pub status: TransactionStatus,
    pub gateway_response: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub restaurant_id: Uuid,
    pub order_id: Uuid,
    pub payment_gateway: String,
    pub gateway_order_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub status: TransactionStatus,
    pub gateway_response: serde_json::Value,
}

// ============================================================================
// Restaurant & Credential Models
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Restaurant {
    pub id: Uuid,
    pub name: String,
    pub status: String,
}

impl Restaurant {
    pub fn is_active(&self) -> bool {
        self.status == "active"
    }
}

/// Gateway deployment a restaurant's credentials belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayEnvironment {
    Sandbox,
    Production,
}

impl GatewayEnvironment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sandbox => "sandbox",
            Self::Production => "production",
        }
    }

    /// Anything other than `production` is treated as sandbox.
    pub fn from_setting(value: &str) -> Self {
        if value.trim() == "production" {
            Self::Production
        } else {
            Self::Sandbox
        }
    }
}

impl fmt::Display for GatewayEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decrypted view of a restaurant's gateway credentials.
#[derive(Debug, Clone)]
pub struct GatewayCredentials {
    pub client_id: String,
    pub client_secret: Secret<String>,
    pub environment: GatewayEnvironment,
}

impl GatewayCredentials {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        environment: GatewayEnvironment,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: Secret::new(client_secret.into()),
            environment,
        }
    }

    /// Both halves of the key pair must be present before calling the gateway.
    pub fn is_complete(&self) -> bool {
        !self.client_id.trim().is_empty() && !self.client_secret.expose_secret().trim().is_empty()
    }
}
