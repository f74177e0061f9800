//! Mapping from gateway order status to local order state.

use crate::models::{OrderStatus, PaymentStatus};

/// `order_status` values reported by the gateway's order endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayOrderStatus {
    Active,
    Paid,
    Expired,
    Cancelled,
    Other(String),
}

impl GatewayOrderStatus {
    /// Case-sensitive; the gateway always reports upper case.
    pub fn parse(value: &str) -> Self {
        match value {
            "ACTIVE" => Self::Active,
            "PAID" => Self::Paid,
            "EXPIRED" => Self::Expired,
            "CANCELLED" => Self::Cancelled,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Local `(payment_status, status)` pair of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalState {
    pub payment_status: PaymentStatus,
    pub status: OrderStatus,
}

/// Applies a gateway status to the current local state.
///
/// `PAID` completes the payment and confirms the order, `EXPIRED` and
/// `CANCELLED` fail the payment without touching fulfillment, `ACTIVE` keeps
/// the payment pending, and unrecognized values leave the state unchanged.
pub fn reconcile(current: LocalState, gateway: &GatewayOrderStatus) -> LocalState {
    match gateway {
        GatewayOrderStatus::Paid => LocalState {
            payment_status: PaymentStatus::Completed,
            status: OrderStatus::Confirmed,
        },
        GatewayOrderStatus::Expired | GatewayOrderStatus::Cancelled => LocalState {
            payment_status: PaymentStatus::Failed,
            ..current
        },
        GatewayOrderStatus::Active => LocalState {
            payment_status: PaymentStatus::Pending,
            ..current
        },
        GatewayOrderStatus::Other(_) => current,
    }
}
