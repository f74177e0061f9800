use crate::models::{GatewayEnvironment, LineItem, Order, PaymentStatus};
use crate::services::initiation::InitiationOutcome;
use crate::services::verification::VerificationOutcome;
use crate::services::formatting::offline_redirect_url;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

pub const OFFLINE_ORDER_MESSAGE: &str =
    "Order placed successfully! The restaurant will process payment manually.";

// ============================================================================
// Create Payment
// ============================================================================

/// Missing fields decode to empty values so they fail validation with a 400
/// rather than a JSON rejection.
#[derive(Debug, Clone, Deserialize, Validate)]
#[validate(schema(function = "validate_order_total", skip_on_field_errors = true))]
pub struct CreatePaymentRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "Missing required fields"))]
    pub restaurant_id: String,

    #[serde(default)]
    #[validate(length(min = 1, message = "Missing required fields"))]
    pub customer_name: String,

    #[serde(default)]
    #[validate(length(min = 1, message = "Missing required fields"))]
    pub customer_phone: String,

    #[serde(default)]
    #[validate(length(min = 1, message = "Missing required fields"))]
    pub table_number: String,

    #[serde(default)]
    #[validate(length(min = 1, message = "Order must contain at least one item"))]
    pub items: Vec<LineItem>,

    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub total_amount: Option<Decimal>,
}

/// Amounts are stored as NUMERIC(12, 2); anything finer would be rounded away.
const MONEY_SCALE: u32 = 2;

fn has_money_scale(amount: Decimal) -> bool {
    amount.normalize().scale() <= MONEY_SCALE
}

fn validate_order_total(request: &CreatePaymentRequest) -> Result<(), ValidationError> {
    let total = request
        .total_amount
        .ok_or_else(|| ValidationError::new("total_amount_required"))?;

    if total <= Decimal::ZERO {
        return Err(ValidationError::new("total_amount_not_positive"));
    }

    let lines_in_scale = request
        .items
        .iter()
        .all(|item| has_money_scale(item.line_total));
    if !has_money_scale(total) || !lines_in_scale {
        return Err(ValidationError::new("amount_precision"));
    }

    let line_sum: Decimal = request.items.iter().map(|item| item.line_total).sum();
    if line_sum != total {
        return Err(ValidationError::new("total_amount_mismatch"));
    }

    Ok(())
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum CreatePaymentResponse {
    Offline {
        success: bool,
        order_id: Uuid,
        message: String,
        redirect_url: String,
        payment_configured: bool,
    },
    Online {
        success: bool,
        order_id: Uuid,
        payment_session_id: String,
        cashfree_order_id: String,
        environment: GatewayEnvironment,
    },
}

impl From<InitiationOutcome> for CreatePaymentResponse {
    fn from(outcome: InitiationOutcome) -> Self {
        match outcome {
            InitiationOutcome::Offline { order } => Self::Offline {
                success: true,
                order_id: order.id,
                message: OFFLINE_ORDER_MESSAGE.to_string(),
                redirect_url: offline_redirect_url(&order.id),
                payment_configured: false,
            },
            InitiationOutcome::Online {
                order_id,
                payment_session_id,
                gateway_order_id,
                environment,
            } => Self::Online {
                success: true,
                order_id,
                payment_session_id,
                cashfree_order_id: gateway_order_id,
                environment,
            },
        }
    }
}

// ============================================================================
// Verify Payment
// ============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct VerifyPaymentRequest {
    #[serde(rename = "orderId", default)]
    #[validate(length(min = 1, message = "Order ID is required"))]
    pub order_id: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyPaymentResponse {
    pub success: bool,
    pub payment_status: PaymentStatus,
    pub order: Order,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cashfree_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl From<VerificationOutcome> for VerifyPaymentResponse {
    fn from(outcome: VerificationOutcome) -> Self {
        Self {
            success: true,
            payment_status: outcome.order.payment_status,
            order: outcome.order,
            cashfree_status: outcome.gateway_status,
            message: outcome.message,
        }
    }
}

// ============================================================================
// Webhook
// ============================================================================

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_status: Option<PaymentStatus>,
}
