//! Identifier and request-field formatting for the gateway.
//!
//! The gateway restricts order ids to `[A-Za-z0-9_]{1,50}` and insists on a
//! customer email, which restaurant customers never provide.

use crate::error::PaymentError;
use crate::models::GatewayEnvironment;
use uuid::Uuid;

/// Maximum order id length accepted by the gateway.
pub const GATEWAY_ORDER_ID_MAX_LEN: usize = 50;

/// Builds `ord_<last 10 digits of epoch millis>_<first 20 hex chars of order id>`.
///
/// The result is bounded at 35 characters and stays traceable to the
/// internal order.
pub fn gateway_order_id(order_id: &Uuid, now_millis: i64) -> String {
    let millis = now_millis.unsigned_abs().to_string();
    let timestamp = &millis[millis.len().saturating_sub(10)..];
    let simple = order_id.simple().to_string();
    format!("ord_{}_{}", timestamp, &simple[..20])
}

pub fn customer_id(now_millis: i64) -> String {
    format!("cust_{}", now_millis.unsigned_abs())
}

pub fn normalize_phone(phone: &str) -> String {
    phone.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Deterministic stand-in for the customer email the gateway requires.
pub fn placeholder_customer_email(phone: &str, domain: &str) -> String {
    format!("{}@{}", normalize_phone(phone), domain)
}

/// Resolves the base URL used for gateway return and notify callbacks.
///
/// Production callbacks must be HTTPS: a plaintext localhost URL is replaced
/// by `placeholder`, other `http://` URLs are upgraded, and anything still not
/// HTTPS is rejected.
pub fn resolve_callback_base(
    app_url: &str,
    environment: GatewayEnvironment,
    placeholder: &str,
) -> Result<String, PaymentError> {
    let app_url = app_url.trim().trim_end_matches('/');

    match environment {
        GatewayEnvironment::Sandbox => Ok(app_url.to_string()),
        GatewayEnvironment::Production => {
            let resolved = if app_url.starts_with("http://localhost") {
                placeholder.trim().trim_end_matches('/').to_string()
            } else if let Some(rest) = app_url.strip_prefix("http://") {
                format!("https://{}", rest)
            } else {
                app_url.to_string()
            };

            if resolved.starts_with("https://") {
                Ok(resolved)
            } else {
                Err(PaymentError::InsecureCallback(resolved))
            }
        }
    }
}

pub fn return_url(callback_base: &str, order_id: &Uuid) -> String {
    format!("{}/payment/success?order_id={}", callback_base, order_id)
}

pub fn notify_url(callback_base: &str) -> String {
    format!("{}/api/payment-webhook", callback_base)
}

/// Client-side landing page for orders settled offline.
pub fn offline_redirect_url(order_id: &Uuid) -> String {
    format!("/payment/success?order_id={}&no_payment=true", order_id)
}
