//! Cashfree webhook parsing and signature verification.
//!
//! The signature is `base64(HMAC-SHA256(timestamp + raw_body, client_secret))`.
//! Payload contents only identify the order; payment truth always comes from
//! the gateway's order endpoint.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;

pub const TIMESTAMP_HEADER: &str = "x-webhook-timestamp";
pub const SIGNATURE_HEADER: &str = "x-webhook-signature";

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    #[serde(rename = "type", default)]
    pub event_type: Option<String>,
    pub data: WebhookData,
}

#[derive(Debug, Deserialize)]
pub struct WebhookData {
    pub order: WebhookOrder,
}

#[derive(Debug, Deserialize)]
pub struct WebhookOrder {
    pub order_id: String,
}

impl WebhookPayload {
    pub fn parse(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }

    pub fn gateway_order_id(&self) -> &str {
        &self.data.order.order_id
    }
}

pub fn compute_signature(timestamp: &str, body: &[u8], secret: &str) -> String {
    // HMAC accepts keys of any length.
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(timestamp.as_bytes());
    mac.update(body);
    STANDARD.encode(mac.finalize().into_bytes())
}

pub fn verify_signature(timestamp: &str, body: &[u8], signature: &str, secret: &str) -> bool {
    let expected = compute_signature(timestamp, body, secret);
    let is_valid = !expected.is_empty()
        && bool::from(expected.as_bytes().ct_eq(signature.trim().as_bytes()));

    if !is_valid {
        tracing::warn!("Webhook signature verification failed");
    }

    is_valid
}
