//! In-memory repositories for tests and local runs without PostgreSQL.

use crate::models::{
    GatewayCredentials, NewOrder, NewTransaction, Order, OrderStatus, PaymentStatus, Restaurant,
    Transaction,
};
use crate::services::repository::{
    CredentialStore, OrderRepository, RestaurantDirectory, TransactionRepository,
};
use crate::services::status::LocalState;
use async_trait::async_trait;
use chrono::Utc;
use service_core::error::AppError;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

#[derive(Default)]
pub struct InMemoryStore {
    orders: Mutex<HashMap<Uuid, Order>>,
    transactions: Mutex<Vec<Transaction>>,
    restaurants: Mutex<HashMap<Uuid, Restaurant>>,
    credentials: Mutex<HashMap<Uuid, GatewayCredentials>>,
    credentials_unavailable: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, AppError> {
    mutex
        .lock()
        .map_err(|_| AppError::InternalError(anyhow::anyhow!("in-memory store lock poisoned")))
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_restaurant(&self, id: Uuid, name: &str, status: &str) {
        if let Ok(mut restaurants) = self.restaurants.lock() {
            restaurants.insert(
                id,
                Restaurant {
                    id,
                    name: name.to_string(),
                    status: status.to_string(),
                },
            );
        }
    }

    pub fn set_credentials(&self, restaurant_id: Uuid, credentials: GatewayCredentials) {
        if let Ok(mut map) = self.credentials.lock() {
            map.insert(restaurant_id, credentials);
        }
    }

    /// Makes credential lookups fail as if the backing store were down.
    pub fn set_credentials_unavailable(&self, unavailable: bool) {
        self.credentials_unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn orders(&self) -> Vec<Order> {
        self.orders
            .lock()
            .map(|orders| orders.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn transactions(&self) -> Vec<Transaction> {
        self.transactions
            .lock()
            .map(|txs| txs.clone())
            .unwrap_or_default()
    }

    fn update_order<F>(&self, id: Uuid, apply: F) -> Result<(), AppError>
    where
        F: FnOnce(&mut Order),
    {
        let mut orders = lock(&self.orders)?;
        let order = orders
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Order not found")))?;
        apply(order);
        order.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl OrderRepository for InMemoryStore {
    async fn create_order(&self, order: NewOrder) -> Result<Order, AppError> {
        let now = Utc::now();
        let order = Order {
            id: Uuid::new_v4(),
            restaurant_id: order.restaurant_id,
            customer_name: order.customer_name,
            customer_phone: order.customer_phone,
            table_number: order.table_number,
            items: order.items,
            total_amount: order.total_amount,
            status: OrderStatus::Pending,
            payment_status: order.payment_status,
            payment_gateway_order_id: None,
            payment_error: None,
            created_at: now,
            updated_at: now,
        };
        lock(&self.orders)?.insert(order.id, order.clone());
        Ok(order)
    }

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, AppError> {
        Ok(lock(&self.orders)?.get(&id).cloned())
    }

    async fn find_by_gateway_order_id(
        &self,
        gateway_order_id: &str,
    ) -> Result<Option<Order>, AppError> {
        Ok(lock(&self.orders)?
            .values()
            .find(|o| o.payment_gateway_order_id.as_deref() == Some(gateway_order_id))
            .cloned())
    }

    async fn record_payment_failure(
        &self,
        id: Uuid,
        error: serde_json::Value,
    ) -> Result<(), AppError> {
        self.update_order(id, |order| {
            order.payment_status = PaymentStatus::Failed;
            order.payment_error = Some(error);
        })
    }

    async fn attach_gateway_order(&self, id: Uuid, gateway_order_id: &str) -> Result<(), AppError> {
        self.update_order(id, |order| {
            order.payment_gateway_order_id = Some(gateway_order_id.to_string());
        })
    }

    async fn transition_payment(
        &self,
        id: Uuid,
        expected: PaymentStatus,
        next: LocalState,
    ) -> Result<Option<Order>, AppError> {
        let mut orders = lock(&self.orders)?;
        match orders.get_mut(&id) {
            Some(order) if order.payment_status == expected => {
                order.payment_status = next.payment_status;
                order.status = next.status;
                order.updated_at = Utc::now();
                Ok(Some(order.clone()))
            }
            _ => Ok(None),
        }
    }
}

#[async_trait]
impl TransactionRepository for InMemoryStore {
    async fn append_transaction(
        &self,
        transaction: NewTransaction,
    ) -> Result<Transaction, AppError> {
        let now = Utc::now();
        let transaction = Transaction {
            id: Uuid::new_v4(),
            restaurant_id: transaction.restaurant_id,
            order_id: transaction.order_id,
            payment_gateway: transaction.payment_gateway,
            gateway_order_id: transaction.gateway_order_id,
            amount: transaction.amount,
            currency: transaction.currency,
            status: transaction.status,
            gateway_response: transaction.gateway_response,
            created_at: now,
            updated_at: now,
        };
        lock(&self.transactions)?.push(transaction.clone());
        Ok(transaction)
    }

    async fn list_for_order(&self, order_id: Uuid) -> Result<Vec<Transaction>, AppError> {
        Ok(lock(&self.transactions)?
            .iter()
            .filter(|t| t.order_id == order_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl RestaurantDirectory for InMemoryStore {
    async fn find_restaurant(&self, id: Uuid) -> Result<Option<Restaurant>, AppError> {
        Ok(lock(&self.restaurants)?.get(&id).cloned())
    }
}

#[async_trait]
impl CredentialStore for InMemoryStore {
    async fn get_decrypted_credentials(
        &self,
        restaurant_id: Uuid,
    ) -> Result<Option<GatewayCredentials>, AppError> {
        if self.credentials_unavailable.load(Ordering::SeqCst) {
            return Err(AppError::DatabaseError(anyhow::anyhow!(
                "payment settings unavailable"
            )));
        }
        Ok(lock(&self.credentials)?.get(&restaurant_id).cloned())
    }
}
