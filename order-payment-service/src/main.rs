//! Order payment service entry point.

use order_payment_service::config::PaymentConfig;
use order_payment_service::services::init_metrics;
use order_payment_service::startup::Application;
use service_core::observability::init_tracing;
use tokio::signal;

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let config = PaymentConfig::from_env().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        std::io::Error::other(format!("Configuration error: {}", e))
    })?;

    init_tracing(
        &config.service_name,
        &config.log_level,
        config.otlp_endpoint.as_deref(),
    );

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting order-payment-service");

    init_metrics().map_err(|e| std::io::Error::other(format!("Metrics error: {}", e)))?;

    tracing::info!(
        service_name = %config.service_name,
        http_port = %config.common.port,
        db_max_connections = %config.database.max_connections,
        cashfree_sandbox_url = %config.cashfree.sandbox_base_url,
        cashfree_api_version = %config.cashfree.api_version,
        app_url = %config.callbacks.app_url,
        "Configuration loaded"
    );

    let app = Application::build(config).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to build application");
        std::io::Error::other(format!("Application build error: {}", e))
    })?;

    tokio::select! {
        result = app.run_until_stopped() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Application error");
                return Err(e);
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("Graceful shutdown initiated");
        }
    }

    tracing::info!("Service shutdown complete");
    Ok(())
}
