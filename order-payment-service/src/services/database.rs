//! PostgreSQL-backed repositories for order-payment-service.

use crate::config::DatabaseConfig;
use crate::models::{
    GatewayCredentials, GatewayEnvironment, LineItem, NewOrder, NewTransaction, Order,
    PaymentStatus, Restaurant, Transaction,
};
use crate::services::credentials::CredentialCipher;
use crate::services::metrics::DB_QUERY_DURATION;
use crate::services::repository::{
    CredentialStore, OrderRepository, RestaurantDirectory, TransactionRepository,
};
use crate::services::status::LocalState;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use sqlx::FromRow;
use std::time::Duration;
use tracing::{info, instrument, warn};
use uuid::Uuid;

const ORDER_COLUMNS: &str = "id, restaurant_id, customer_name, customer_phone, table_number, \
    items, total_amount, status, payment_status, payment_gateway_order_id, payment_error, \
    created_at, updated_at";

const TRANSACTION_COLUMNS: &str = "id, restaurant_id, order_id, payment_gateway, \
    gateway_order_id, amount, currency, status, gateway_response, created_at, updated_at";

#[derive(Debug, FromRow)]
struct OrderRow {
    id: Uuid,
    restaurant_id: Uuid,
    customer_name: String,
    customer_phone: String,
    table_number: String,
    items: Json<Vec<LineItem>>,
    total_amount: Decimal,
    status: String,
    payment_status: String,
    payment_gateway_order_id: Option<String>,
    payment_error: Option<serde_json::Value>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = AppError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            restaurant_id: row.restaurant_id,
            customer_name: row.customer_name,
            customer_phone: row.customer_phone,
            table_number: row.table_number,
            items: row.items.0,
            total_amount: row.total_amount,
            status: row.status.parse().map_err(AppError::DatabaseError)?,
            payment_status: row.payment_status.parse().map_err(AppError::DatabaseError)?,
            payment_gateway_order_id: row.payment_gateway_order_id,
            payment_error: row.payment_error,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct TransactionRow {
    id: Uuid,
    restaurant_id: Uuid,
    order_id: Uuid,
    payment_gateway: String,
    gateway_order_id: String,
    amount: Decimal,
    currency: String,
    status: String,
    gateway_response: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TransactionRow> for Transaction {
    type Error = AppError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            restaurant_id: row.restaurant_id,
            order_id: row.order_id,
            payment_gateway: row.payment_gateway,
            gateway_order_id: row.gateway_order_id,
            amount: row.amount,
            currency: row.currency,
            status: row.status.parse().map_err(AppError::DatabaseError)?,
            gateway_response: row.gateway_response,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct RestaurantRow {
    id: Uuid,
    name: String,
    status: String,
}

#[derive(Debug, FromRow)]
struct PaymentSettingsRow {
    client_id_encrypted: Option<String>,
    client_secret_encrypted: Option<String>,
    cashfree_environment: Option<String>,
}

fn db_error(context: &str, err: sqlx::Error) -> AppError {
    AppError::DatabaseError(anyhow::anyhow!("{}: {}", context, err))
}

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
    cipher: CredentialCipher,
}

impl Database {
    #[instrument(skip(config, cipher), fields(service = "order-payment-service"))]
    pub async fn connect(config: &DatabaseConfig, cipher: CredentialCipher) -> Result<Self, AppError> {
        info!(
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(config.url.expose_secret())
            .await
            .map_err(|e| db_error("Failed to connect", e))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool, cipher })
    }

    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["health_check"])
            .start_timer();

        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("Health check failed", e))?;

        timer.observe_duration();
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }
}

// =========================================================================
// Order Operations
// =========================================================================

#[async_trait]
impl OrderRepository for Database {
    #[instrument(skip(self, order), fields(restaurant_id = %order.restaurant_id))]
    async fn create_order(&self, order: NewOrder) -> Result<Order, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_order"])
            .start_timer();

        let query = format!(
            r#"
            INSERT INTO orders (id, restaurant_id, customer_name, customer_phone, table_number,
                                items, total_amount, status, payment_status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'pending', $8)
            RETURNING {}
            "#,
            ORDER_COLUMNS
        );

        let row = sqlx::query_as::<_, OrderRow>(&query)
            .bind(Uuid::new_v4())
            .bind(order.restaurant_id)
            .bind(&order.customer_name)
            .bind(&order.customer_phone)
            .bind(&order.table_number)
            .bind(Json(&order.items))
            .bind(order.total_amount)
            .bind(order.payment_status.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| db_error("Failed to create order", e))?;

        timer.observe_duration();
        info!(order_id = %row.id, payment_status = %row.payment_status, "Order created");
        row.try_into()
    }

    #[instrument(skip(self))]
    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_order"])
            .start_timer();

        let query = format!("SELECT {} FROM orders WHERE id = $1", ORDER_COLUMNS);
        let row = sqlx::query_as::<_, OrderRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to get order", e))?;

        timer.observe_duration();
        row.map(Order::try_from).transpose()
    }

    #[instrument(skip(self))]
    async fn find_by_gateway_order_id(
        &self,
        gateway_order_id: &str,
    ) -> Result<Option<Order>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_by_gateway_order_id"])
            .start_timer();

        let query = format!(
            "SELECT {} FROM orders WHERE payment_gateway_order_id = $1",
            ORDER_COLUMNS
        );
        let row = sqlx::query_as::<_, OrderRow>(&query)
            .bind(gateway_order_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to find order by gateway id", e))?;

        timer.observe_duration();
        row.map(Order::try_from).transpose()
    }

    #[instrument(skip(self, error))]
    async fn record_payment_failure(
        &self,
        id: Uuid,
        error: serde_json::Value,
    ) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["record_payment_failure"])
            .start_timer();

        sqlx::query(
            r#"
            UPDATE orders
            SET payment_status = 'failed', payment_error = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(error)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to record payment failure", e))?;

        timer.observe_duration();
        warn!(order_id = %id, "Order payment marked failed");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn attach_gateway_order(&self, id: Uuid, gateway_order_id: &str) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["attach_gateway_order"])
            .start_timer();

        sqlx::query(
            r#"
            UPDATE orders
            SET payment_gateway_order_id = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(gateway_order_id)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to attach gateway order", e))?;

        timer.observe_duration();
        Ok(())
    }

    #[instrument(skip(self, next), fields(next_payment_status = %next.payment_status))]
    async fn transition_payment(
        &self,
        id: Uuid,
        expected: PaymentStatus,
        next: LocalState,
    ) -> Result<Option<Order>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["transition_payment"])
            .start_timer();

        let query = format!(
            r#"
            UPDATE orders
            SET payment_status = $3, status = $4, updated_at = NOW()
            WHERE id = $1 AND payment_status = $2
            RETURNING {}
            "#,
            ORDER_COLUMNS
        );
        let row = sqlx::query_as::<_, OrderRow>(&query)
            .bind(id)
            .bind(expected.as_str())
            .bind(next.payment_status.as_str())
            .bind(next.status.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to update payment status", e))?;

        timer.observe_duration();
        row.map(Order::try_from).transpose()
    }
}

// =========================================================================
// Transaction Operations
// =========================================================================

#[async_trait]
impl TransactionRepository for Database {
    #[instrument(skip(self, transaction), fields(order_id = %transaction.order_id))]
    async fn append_transaction(
        &self,
        transaction: NewTransaction,
    ) -> Result<Transaction, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["append_transaction"])
            .start_timer();

        let query = format!(
            r#"
            INSERT INTO transactions (id, restaurant_id, order_id, payment_gateway,
                                      gateway_order_id, amount, currency, status, gateway_response)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {}
            "#,
            TRANSACTION_COLUMNS
        );
        let row = sqlx::query_as::<_, TransactionRow>(&query)
            .bind(Uuid::new_v4())
            .bind(transaction.restaurant_id)
            .bind(transaction.order_id)
            .bind(&transaction.payment_gateway)
            .bind(&transaction.gateway_order_id)
            .bind(transaction.amount)
            .bind(&transaction.currency)
            .bind(transaction.status.as_str())
            .bind(&transaction.gateway_response)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| db_error("Failed to append transaction", e))?;

        timer.observe_duration();
        info!(transaction_id = %row.id, "Transaction recorded");
        row.try_into()
    }

    #[instrument(skip(self))]
    async fn list_for_order(&self, order_id: Uuid) -> Result<Vec<Transaction>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_transactions"])
            .start_timer();

        let query = format!(
            "SELECT {} FROM transactions WHERE order_id = $1 ORDER BY created_at",
            TRANSACTION_COLUMNS
        );
        let rows = sqlx::query_as::<_, TransactionRow>(&query)
            .bind(order_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("Failed to list transactions", e))?;

        timer.observe_duration();
        rows.into_iter().map(Transaction::try_from).collect()
    }
}

// =========================================================================
// Restaurant & Credential Operations
// =========================================================================

#[async_trait]
impl RestaurantDirectory for Database {
    #[instrument(skip(self))]
    async fn find_restaurant(&self, id: Uuid) -> Result<Option<Restaurant>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_restaurant"])
            .start_timer();

        let row = sqlx::query_as::<_, RestaurantRow>(
            "SELECT id, name, status FROM restaurants WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to find restaurant", e))?;

        timer.observe_duration();
        Ok(row.map(|r| Restaurant {
            id: r.id,
            name: r.name,
            status: r.status,
        }))
    }
}

#[async_trait]
impl CredentialStore for Database {
    #[instrument(skip(self))]
    async fn get_decrypted_credentials(
        &self,
        restaurant_id: Uuid,
    ) -> Result<Option<GatewayCredentials>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_payment_settings"])
            .start_timer();

        let row = sqlx::query_as::<_, PaymentSettingsRow>(
            r#"
            SELECT client_id_encrypted, client_secret_encrypted, cashfree_environment
            FROM payment_settings
            WHERE restaurant_id = $1 AND is_payment_enabled = TRUE
            "#,
        )
        .bind(restaurant_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to load payment settings", e))?;

        timer.observe_duration();

        let Some(row) = row else {
            return Ok(None);
        };

        let open = |value: Option<String>| -> Result<String, AppError> {
            match value.filter(|v| !v.is_empty()) {
                Some(sealed) => self.cipher.open(&sealed).map_err(|e| {
                    AppError::InternalError(anyhow::anyhow!(
                        "Failed to decrypt payment credentials: {}",
                        e
                    ))
                }),
                None => Ok(String::new()),
            }
        };

        let client_id = open(row.client_id_encrypted)?;
        let client_secret = open(row.client_secret_encrypted)?;
        let environment =
            GatewayEnvironment::from_setting(row.cashfree_environment.as_deref().unwrap_or_default());

        Ok(Some(GatewayCredentials::new(client_id, client_secret, environment)))
    }
}
