//! Storage seams used by the payment services.

use crate::models::{
    GatewayCredentials, NewOrder, NewTransaction, Order, PaymentStatus, Restaurant, Transaction,
};
use crate::services::status::LocalState;
use async_trait::async_trait;
use service_core::error::AppError;
use std::sync::Arc;
use uuid::Uuid;

#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn create_order(&self, order: NewOrder) -> Result<Order, AppError>;

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, AppError>;

    async fn find_by_gateway_order_id(&self, gateway_order_id: &str)
        -> Result<Option<Order>, AppError>;

    /// Sets payment status `failed` and records `error` on the order.
    async fn record_payment_failure(
        &self,
        id: Uuid,
        error: serde_json::Value,
    ) -> Result<(), AppError>;

    /// Links the order to the gateway order created for it.
    async fn attach_gateway_order(&self, id: Uuid, gateway_order_id: &str) -> Result<(), AppError>;

    /// Applies `next` only while the stored payment status still equals
    /// `expected`. Returns `None` when another writer got there first.
    async fn transition_payment(
        &self,
        id: Uuid,
        expected: PaymentStatus,
        next: LocalState,
    ) -> Result<Option<Order>, AppError>;
}

/// Append-only log of gateway attempts.
#[async_trait]
pub trait TransactionRepository: Send + Sync {
    async fn append_transaction(&self, transaction: NewTransaction)
        -> Result<Transaction, AppError>;

    async fn list_for_order(&self, order_id: Uuid) -> Result<Vec<Transaction>, AppError>;
}

#[async_trait]
pub trait RestaurantDirectory: Send + Sync {
    async fn find_restaurant(&self, id: Uuid) -> Result<Option<Restaurant>, AppError>;
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// `None` when the restaurant has no enabled gateway credentials.
    async fn get_decrypted_credentials(
        &self,
        restaurant_id: Uuid,
    ) -> Result<Option<GatewayCredentials>, AppError>;
}

/// Shared handles to every repository.
#[derive(Clone)]
pub struct Repositories {
    pub orders: Arc<dyn OrderRepository>,
    pub transactions: Arc<dyn TransactionRepository>,
    pub restaurants: Arc<dyn RestaurantDirectory>,
    pub credentials: Arc<dyn CredentialStore>,
}

impl Repositories {
    /// Uses one backing store for every repository.
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: OrderRepository + TransactionRepository + RestaurantDirectory + CredentialStore + 'static,
    {
        Self {
            orders: store.clone(),
            transactions: store.clone(),
            restaurants: store.clone(),
            credentials: store,
        }
    }
}
