//! Application startup and lifecycle management.

use crate::config::{CallbackConfig, CashfreeConfig, PaymentConfig};
use crate::handlers;
use crate::services::{
    CashfreeClient, CredentialCipher, Database, PaymentInitiationService,
    PaymentVerificationService, Repositories,
};
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{metrics_middleware, request_id_middleware, REQUEST_ID_HEADER};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub repositories: Repositories,
    pub initiation: PaymentInitiationService,
    pub verification: PaymentVerificationService,
    pub db: Option<Arc<Database>>,
}

impl AppState {
    /// Wires both payment services over the given repositories.
    pub fn new(
        repositories: Repositories,
        cashfree: CashfreeConfig,
        callbacks: CallbackConfig,
        db: Option<Arc<Database>>,
    ) -> Result<Self, AppError> {
        let gateway = CashfreeClient::new(cashfree).map_err(|e| {
            AppError::ConfigError(anyhow::anyhow!("Failed to build gateway client: {}", e))
        })?;

        Ok(Self {
            initiation: PaymentInitiationService::new(
                repositories.clone(),
                gateway.clone(),
                callbacks,
            ),
            verification: PaymentVerificationService::new(repositories.clone(), gateway),
            repositories,
            db,
        })
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics))
        .route("/api/create-payment", post(handlers::payments::create_payment))
        .route("/api/verify-payment", post(handlers::payments::verify_payment))
        .route("/api/payment-webhook", post(handlers::payments::payment_webhook))
        .route("/api/orders/:id", get(handlers::payments::get_order))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        )
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Connects to PostgreSQL, applies migrations and binds the listener.
    pub async fn build(config: PaymentConfig) -> Result<Self, AppError> {
        let cipher = CredentialCipher::from_base64_key(&config.credentials.encryption_key)
            .map_err(|e| AppError::ConfigError(anyhow::anyhow!("{}", e)))?;

        let db = Database::connect(&config.database, cipher)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to connect to PostgreSQL");
                e
            })?;

        db.run_migrations().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to run migrations");
            e
        })?;

        let db = Arc::new(db);
        let repositories = Repositories::from_store(db.clone());
        let state = AppState::new(
            repositories,
            config.cashfree.clone(),
            config.callbacks.clone(),
            Some(db),
        )?;

        let addr = format!("{}:{}", config.common.host, config.common.port);
        let listener = TcpListener::bind(&addr).await.map_err(|e| {
            tracing::error!(error = %e, addr = %addr, "Failed to bind HTTP listener");
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(port = port, "Order payment service listener bound");

        Ok(Self {
            port,
            listener,
            state,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let router = build_router(self.state);

        tracing::info!(
            service = "order-payment-service",
            version = env!("CARGO_PKG_VERSION"),
            port = self.port,
            "Service ready to accept connections"
        );

        axum::serve(self.listener, router).await
    }
}
