use crate::dtos::{
    CreatePaymentRequest, CreatePaymentResponse, VerifyPaymentRequest, VerifyPaymentResponse,
    WebhookAck,
};
use crate::models::Order;
use crate::services::webhook::{verify_signature, WebhookPayload, SIGNATURE_HEADER, TIMESTAMP_HEADER};
use crate::startup::AppState;
use crate::utils::ValidatedJson;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use secrecy::ExposeSecret;
use service_core::error::AppError;
use uuid::Uuid;

#[tracing::instrument(skip(state, request))]
pub async fn create_payment(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<CreatePaymentRequest>,
) -> Result<Json<CreatePaymentResponse>, AppError> {
    let outcome = state.initiation.initiate(request).await?;
    Ok(Json(outcome.into()))
}

#[tracing::instrument(skip(state, request), fields(order_id = %request.order_id))]
pub async fn verify_payment(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<VerifyPaymentRequest>,
) -> Result<Json<VerifyPaymentResponse>, AppError> {
    let outcome = state.verification.verify(&request.order_id).await?;
    Ok(Json(outcome.into()))
}

#[tracing::instrument(skip(state))]
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Order>, AppError> {
    let id = Uuid::parse_str(&id)
        .map_err(|_| AppError::BadRequest(anyhow::anyhow!("Invalid order ID")))?;

    let order = state
        .repositories
        .orders
        .get_order(id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Order not found")))?;

    Ok(Json(order))
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
}

/// Gateway notification endpoint.
///
/// The payload only names the order; its status is re-read from the gateway
/// through the verification service once the signature checks out.
#[tracing::instrument(skip(state, headers, body))]
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, AppError> {
    let payload = WebhookPayload::parse(&body)
        .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Invalid webhook payload: {}", e)))?;
    let gateway_order_id = payload.gateway_order_id();

    // Unsigned requests are refused before any lookup. A signed request for an
    // unknown order is still acknowledged: the signing secret belongs to the
    // order's restaurant, so it cannot be checked without the order.
    let (Some(timestamp), Some(signature)) = (
        header(&headers, TIMESTAMP_HEADER),
        header(&headers, SIGNATURE_HEADER),
    ) else {
        return Err(AppError::Unauthorized(anyhow::anyhow!(
            "Missing webhook signature"
        )));
    };

    let Some(order) = state
        .repositories
        .orders
        .find_by_gateway_order_id(gateway_order_id)
        .await?
    else {
        tracing::warn!(gateway_order_id = %gateway_order_id, "Webhook for unknown order");
        return Ok(Json(WebhookAck {
            received: true,
            payment_status: None,
        }));
    };

    let Some(credentials) = state
        .repositories
        .credentials
        .get_decrypted_credentials(order.restaurant_id)
        .await?
    else {
        tracing::warn!(order_id = %order.id, "Webhook for restaurant without payment credentials");
        return Ok(Json(WebhookAck {
            received: true,
            payment_status: Some(order.payment_status),
        }));
    };

    if !verify_signature(
        timestamp,
        &body,
        signature,
        credentials.client_secret.expose_secret(),
    ) {
        return Err(AppError::Unauthorized(anyhow::anyhow!(
            "Invalid webhook signature"
        )));
    }

    tracing::info!(
        order_id = %order.id,
        event_type = payload.event_type.as_deref().unwrap_or("-"),
        "Webhook accepted; verifying with gateway"
    );

    let outcome = state.verification.reconcile_order(order).await?;

    Ok(Json(WebhookAck {
        received: true,
        payment_status: Some(outcome.order.payment_status),
    }))
}
