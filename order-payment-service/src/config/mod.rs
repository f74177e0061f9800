//! Configuration module for order-payment-service.

use secrecy::Secret;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

#[derive(Debug, Clone)]
pub struct PaymentConfig {
    pub common: core_config::Config,
    pub service_name: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
    pub cashfree: CashfreeConfig,
    pub callbacks: CallbackConfig,
    pub credentials: CredentialsConfig,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    pub max_connections: u32,
    pub min_connections: u32,
}

/// Gateway endpoints and request defaults.
#[derive(Debug, Clone)]
pub struct CashfreeConfig {
    pub production_base_url: String,
    pub sandbox_base_url: String,
    pub api_version: String,
    pub currency: String,
    pub timeout_secs: u64,
}

impl Default for CashfreeConfig {
    fn default() -> Self {
        Self {
            production_base_url: "https://api.cashfree.com".to_string(),
            sandbox_base_url: "https://sandbox.cashfree.com".to_string(),
            api_version: "2022-09-01".to_string(),
            currency: "INR".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Where the gateway sends customers and notifications back to.
#[derive(Debug, Clone)]
pub struct CallbackConfig {
    pub app_url: String,
    pub production_placeholder_url: String,
    pub customer_email_domain: String,
}

impl Default for CallbackConfig {
    fn default() -> Self {
        Self {
            app_url: "http://localhost:3000".to_string(),
            production_placeholder_url: "https://example.com".to_string(),
            customer_email_domain: "servenow.app".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CredentialsConfig {
    /// Base64-encoded 32-byte AES-256-GCM key for `payment_settings` secrets.
    pub encryption_key: Secret<String>,
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl PaymentConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;
        let cashfree_defaults = CashfreeConfig::default();
        let callback_defaults = CallbackConfig::default();

        Ok(Self {
            common,
            service_name: env_or("SERVICE_NAME", "order-payment-service"),
            log_level: env_or("LOG_LEVEL", "info"),
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|s| !s.is_empty()),
            database: DatabaseConfig {
                url: Secret::new(env::var("DATABASE_URL").map_err(|_| {
                    AppError::ConfigError(anyhow::anyhow!("DATABASE_URL is required"))
                })?),
                max_connections: env_parse("DATABASE_MAX_CONNECTIONS", 10),
                min_connections: env_parse("DATABASE_MIN_CONNECTIONS", 2),
            },
            cashfree: CashfreeConfig {
                production_base_url: env_or(
                    "CASHFREE_PRODUCTION_URL",
                    &cashfree_defaults.production_base_url,
                ),
                sandbox_base_url: env_or("CASHFREE_SANDBOX_URL", &cashfree_defaults.sandbox_base_url),
                api_version: env_or("CASHFREE_API_VERSION", &cashfree_defaults.api_version),
                currency: env_or("CASHFREE_CURRENCY", &cashfree_defaults.currency),
                timeout_secs: env_parse("CASHFREE_TIMEOUT_SECS", cashfree_defaults.timeout_secs),
            },
            callbacks: CallbackConfig {
                app_url: env_or("APP_URL", &callback_defaults.app_url),
                production_placeholder_url: env_or(
                    "CALLBACK_PLACEHOLDER_URL",
                    &callback_defaults.production_placeholder_url,
                ),
                customer_email_domain: env_or(
                    "CUSTOMER_EMAIL_DOMAIN",
                    &callback_defaults.customer_email_domain,
                ),
            },
            credentials: CredentialsConfig {
                encryption_key: Secret::new(env::var("CREDENTIALS_ENCRYPTION_KEY").map_err(
                    |_| AppError::ConfigError(anyhow::anyhow!("CREDENTIALS_ENCRYPTION_KEY is required")),
                )?),
            },
        })
    }
}
