//! Payment verification: mirrors the gateway's authoritative order status onto
//! the local order.

use crate::error::PaymentError;
use crate::models::Order;
use crate::services::cashfree::CashfreeClient;
use crate::services::metrics::record_verification;
use crate::services::repository::Repositories;
use crate::services::status::{reconcile, GatewayOrderStatus, LocalState};
use tracing::{info, instrument, warn};
use uuid::Uuid;

pub const NO_GATEWAY_ORDER_MESSAGE: &str = "No payment gateway order ID found";
pub const CREDENTIALS_UNAVAILABLE_MESSAGE: &str = "Cannot verify payment - credentials not available";
pub const CREDENTIALS_MISSING_MESSAGE: &str = "Cannot verify payment - no credentials configured";
pub const STATUS_NOT_SAVED_MESSAGE: &str = "Payment verified but the order could not be updated";
pub const STATUS_NOT_RELOADED_MESSAGE: &str =
    "Order was updated concurrently and could not be reloaded";

#[derive(Debug, Clone)]
pub struct VerificationOutcome {
    pub order: Order,
    /// Raw `order_status` reported by the gateway, when it was reached.
    pub gateway_status: Option<String>,
    pub message: Option<String>,
}

impl VerificationOutcome {
    fn unchanged(order: Order, message: Option<String>) -> Self {
        Self {
            order,
            gateway_status: None,
            message,
        }
    }

    fn stale(order: Order, gateway_status: String, message: &str) -> Self {
        Self {
            order,
            gateway_status: Some(gateway_status),
            message: Some(message.to_string()),
        }
    }
}

#[derive(Clone)]
pub struct PaymentVerificationService {
    repositories: Repositories,
    gateway: CashfreeClient,
}

impl PaymentVerificationService {
    pub fn new(repositories: Repositories, gateway: CashfreeClient) -> Self {
        Self {
            repositories,
            gateway,
        }
    }

    #[instrument(skip(self))]
    pub async fn verify(&self, order_id: &str) -> Result<VerificationOutcome, PaymentError> {
        let order_id = order_id.trim();
        if order_id.is_empty() {
            return Err(PaymentError::Validation("Order ID is required".to_string()));
        }
        let id = Uuid::parse_str(order_id)
            .map_err(|_| PaymentError::Validation("Invalid order ID".to_string()))?;

        let order = self
            .repositories
            .orders
            .get_order(id)
            .await?
            .ok_or_else(|| PaymentError::NotFound("Order not found".to_string()))?;

        self.reconcile_order(order).await
    }

    /// Brings an already loaded order up to date with the gateway.
    ///
    /// Gateway, credential and storage failures never fail the call; the last
    /// known state is returned with a diagnostic message instead.
    #[instrument(skip(self, order), fields(order_id = %order.id))]
    pub async fn reconcile_order(&self, order: Order) -> Result<VerificationOutcome, PaymentError> {
        if !order.payment_status.awaits_gateway() {
            record_verification("settled");
            return Ok(VerificationOutcome::unchanged(order, None));
        }

        let Some(gateway_order_id) = order.payment_gateway_order_id.clone() else {
            record_verification("no_gateway_order");
            return Ok(VerificationOutcome::unchanged(
                order,
                Some(NO_GATEWAY_ORDER_MESSAGE.to_string()),
            ));
        };

        let credentials = match self
            .repositories
            .credentials
            .get_decrypted_credentials(order.restaurant_id)
            .await
        {
            Ok(Some(credentials)) => credentials,
            Ok(None) => {
                record_verification("no_credentials");
                return Ok(VerificationOutcome::unchanged(
                    order,
                    Some(CREDENTIALS_MISSING_MESSAGE.to_string()),
                ));
            }
            Err(err) => {
                warn!(error = %err, "Payment settings lookup failed during verification");
                record_verification("no_credentials");
                return Ok(VerificationOutcome::unchanged(
                    order,
                    Some(CREDENTIALS_UNAVAILABLE_MESSAGE.to_string()),
                ));
            }
        };

        let gateway_order = match self.gateway.get_order(&credentials, &gateway_order_id).await {
            Ok(gateway_order) => gateway_order,
            Err(err) => {
                let err = PaymentError::GatewayUnavailable(err.to_string());
                warn!(error = %err, gateway_order_id = %gateway_order_id, "Gateway status check failed");
                record_verification(err.kind());
                return Ok(VerificationOutcome::unchanged(order, Some(err.to_string())));
            }
        };

        let raw_status = gateway_order.order_status.unwrap_or_default();
        let current = LocalState {
            payment_status: order.payment_status,
            status: order.status,
        };
        let next = reconcile(current, &GatewayOrderStatus::parse(&raw_status));

        if next == current {
            record_verification("unchanged");
            return Ok(VerificationOutcome {
                order,
                gateway_status: Some(raw_status),
                message: None,
            });
        }

        let order = match self
            .repositories
            .orders
            .transition_payment(order.id, order.payment_status, next)
            .await
        {
            Ok(Some(updated)) => {
                info!(
                    payment_status = %updated.payment_status,
                    status = %updated.status,
                    gateway_status = %raw_status,
                    "Order payment status updated"
                );
                record_verification(updated.payment_status.as_str());
                updated
            }
            Ok(None) => {
                info!("Order changed concurrently; returning stored state");
                record_verification("concurrent_update");
                match self.repositories.orders.get_order(order.id).await {
                    Ok(stored) => stored.unwrap_or(order),
                    Err(err) => {
                        warn!(error = %err, "Failed to reload concurrently updated order");
                        return Ok(VerificationOutcome::stale(
                            order,
                            raw_status,
                            STATUS_NOT_RELOADED_MESSAGE,
                        ));
                    }
                }
            }
            Err(err) => {
                warn!(
                    error = %err,
                    gateway_status = %raw_status,
                    "Failed to store verified payment status"
                );
                record_verification("store_error");
                return Ok(VerificationOutcome::stale(
                    order,
                    raw_status,
                    STATUS_NOT_SAVED_MESSAGE,
                ));
            }
        };

        Ok(VerificationOutcome {
            order,
            gateway_status: Some(raw_status),
            message: None,
        })
    }
}
