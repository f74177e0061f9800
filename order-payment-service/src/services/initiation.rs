//! Payment initiation: records the order and opens a gateway checkout session.
//!
//! The order is always persisted before the gateway is contacted, and any
//! failure after that point marks the order `failed` before it is returned.

use crate::config::CallbackConfig;
use crate::dtos::CreatePaymentRequest;
use crate::error::PaymentError;
use crate::models::{
    GatewayCredentials, GatewayEnvironment, NewOrder, NewTransaction, Order, PaymentStatus,
    TransactionStatus,
};
use crate::services::cashfree::{CashfreeClient, CreateOrderRequest, CustomerDetails, OrderMeta};
use crate::services::formatting;
use crate::services::metrics::record_initiation;
use crate::services::repository::Repositories;
use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::json;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

pub const PAYMENT_GATEWAY: &str = "cashfree";

#[derive(Debug, Clone)]
pub enum InitiationOutcome {
    /// The restaurant has no gateway configured; payment is settled offline.
    Offline { order: Order },
    Online {
        order_id: Uuid,
        payment_session_id: String,
        gateway_order_id: String,
        environment: GatewayEnvironment,
    },
}

#[derive(Clone)]
pub struct PaymentInitiationService {
    repositories: Repositories,
    gateway: CashfreeClient,
    callbacks: CallbackConfig,
}

impl PaymentInitiationService {
    pub fn new(repositories: Repositories, gateway: CashfreeClient, callbacks: CallbackConfig) -> Self {
        Self {
            repositories,
            gateway,
            callbacks,
        }
    }

    #[instrument(skip(self, request), fields(restaurant_id = %request.restaurant_id))]
    pub async fn initiate(
        &self,
        request: CreatePaymentRequest,
    ) -> Result<InitiationOutcome, PaymentError> {
        let result = self.run(request).await;
        match &result {
            Ok(InitiationOutcome::Offline { .. }) => record_initiation("offline"),
            Ok(InitiationOutcome::Online { .. }) => record_initiation("online"),
            Err(err) => record_initiation(err.kind()),
        }
        result
    }

    async fn run(&self, request: CreatePaymentRequest) -> Result<InitiationOutcome, PaymentError> {
        request.validate()?;

        let restaurant_id = Uuid::parse_str(request.restaurant_id.trim())
            .map_err(|_| PaymentError::Validation("Invalid restaurant_id".to_string()))?;
        let total_amount = request
            .total_amount
            .ok_or_else(|| PaymentError::Validation("Missing required fields".to_string()))?;

        let credentials = match self
            .repositories
            .credentials
            .get_decrypted_credentials(restaurant_id)
            .await
        {
            Ok(credentials) => credentials,
            Err(err) => {
                error!(error = %err, "Payment settings lookup failed; continuing without gateway");
                None
            }
        };

        match credentials {
            None => self.initiate_offline(restaurant_id, request, total_amount).await,
            Some(credentials) => {
                self.initiate_online(restaurant_id, request, total_amount, credentials)
                    .await
            }
        }
    }

    async fn initiate_offline(
        &self,
        restaurant_id: Uuid,
        request: CreatePaymentRequest,
        total_amount: Decimal,
    ) -> Result<InitiationOutcome, PaymentError> {
        let restaurant = self
            .repositories
            .restaurants
            .find_restaurant(restaurant_id)
            .await?
            .ok_or_else(|| PaymentError::NotFound("Restaurant not found".to_string()))?;

        if !restaurant.is_active() {
            warn!(status = %restaurant.status, "Order rejected for inactive restaurant");
            return Err(PaymentError::RestaurantInactive);
        }

        let order = self
            .repositories
            .orders
            .create_order(new_order(restaurant_id, request, total_amount, PaymentStatus::NotConfigured))
            .await?;

        info!(order_id = %order.id, "Order placed without payment gateway");
        Ok(InitiationOutcome::Offline { order })
    }

    async fn initiate_online(
        &self,
        restaurant_id: Uuid,
        request: CreatePaymentRequest,
        total_amount: Decimal,
        credentials: GatewayCredentials,
    ) -> Result<InitiationOutcome, PaymentError> {
        let order = self
            .repositories
            .orders
            .create_order(new_order(restaurant_id, request, total_amount, PaymentStatus::Pending))
            .await?;

        let now_millis = Utc::now().timestamp_millis();
        let gateway_order_id = formatting::gateway_order_id(&order.id, now_millis);

        let callback_base = match formatting::resolve_callback_base(
            &self.callbacks.app_url,
            credentials.environment,
            &self.callbacks.production_placeholder_url,
        ) {
            Ok(base) => base,
            Err(err) => {
                self.fail_order(&order, json!({ "message": err.to_string() }))
                    .await?;
                return Err(err);
            }
        };

        if !credentials.is_complete() {
            self.fail_order(&order, json!({ "message": "Invalid payment credentials" }))
                .await?;
            return Err(PaymentError::InvalidCredentials);
        }

        let gateway_request = CreateOrderRequest {
            order_id: gateway_order_id.clone(),
            order_amount: order.total_amount,
            order_currency: self.gateway.currency().to_string(),
            customer_details: CustomerDetails {
                customer_id: formatting::customer_id(now_millis),
                customer_name: order.customer_name.clone(),
                customer_email: formatting::placeholder_customer_email(
                    &order.customer_phone,
                    &self.callbacks.customer_email_domain,
                ),
                customer_phone: formatting::normalize_phone(&order.customer_phone),
            },
            order_meta: OrderMeta {
                return_url: formatting::return_url(&callback_base, &order.id),
                notify_url: formatting::notify_url(&callback_base),
            },
        };

        let created = match self.gateway.create_order(&credentials, &gateway_request).await {
            Ok(created) => created,
            Err(err) => {
                self.fail_order(&order, err.snapshot()).await?;
                return Err(PaymentError::Gateway {
                    details: err.details(),
                });
            }
        };

        let Some(payment_session_id) = created.order.payment_session_id.clone() else {
            self.fail_order(&order, created.raw.clone()).await?;
            return Err(PaymentError::Gateway {
                details: created.raw.to_string(),
            });
        };

        self.repositories
            .orders
            .attach_gateway_order(order.id, &gateway_order_id)
            .await?;

        self.repositories
            .transactions
            .append_transaction(NewTransaction {
                restaurant_id,
                order_id: order.id,
                payment_gateway: PAYMENT_GATEWAY.to_string(),
                gateway_order_id: gateway_order_id.clone(),
                amount: order.total_amount,
                currency: self.gateway.currency().to_string(),
                status: TransactionStatus::Pending,
                gateway_response: created.raw,
            })
            .await?;

        info!(
            order_id = %order.id,
            gateway_order_id = %gateway_order_id,
            environment = %credentials.environment,
            "Payment session created"
        );

        Ok(InitiationOutcome::Online {
            order_id: order.id,
            payment_session_id,
            gateway_order_id,
            environment: credentials.environment,
        })
    }

    async fn fail_order(&self, order: &Order, error: serde_json::Value) -> Result<(), PaymentError> {
        warn!(order_id = %order.id, payment_error = %error, "Payment initiation failed");
        self.repositories
            .orders
            .record_payment_failure(order.id, error)
            .await?;
        Ok(())
    }
}

fn new_order(
    restaurant_id: Uuid,
    request: CreatePaymentRequest,
    total_amount: Decimal,
    payment_status: PaymentStatus,
) -> NewOrder {
    NewOrder {
        restaurant_id,
        customer_name: request.customer_name,
        customer_phone: request.customer_phone,
        table_number: request.table_number,
        items: request.items,
        total_amount,
        payment_status,
    }
}
