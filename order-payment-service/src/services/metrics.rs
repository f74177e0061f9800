//! Prometheus metrics for order-payment-service.
//!
//! HTTP request metrics flow through the `metrics` facade into the exporter
//! handle; domain counters live in the default `prometheus` registry. Both are
//! rendered together on `/metrics`.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};
use std::sync::OnceLock;

pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Payment initiations by outcome (`offline`, `online`, or an error kind).
pub static PAYMENT_INITIATIONS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "order_payment_initiations_total",
        "Total number of payment initiations",
        &["outcome"]
    )
    .expect("Failed to register PAYMENT_INITIATIONS")
});

/// Verifications by outcome.
pub static PAYMENT_VERIFICATIONS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "order_payment_verifications_total",
        "Total number of payment verifications",
        &["outcome"]
    )
    .expect("Failed to register PAYMENT_VERIFICATIONS")
});

/// Gateway calls by operation and status.
pub static GATEWAY_CALLS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "order_payment_gateway_calls_total",
        "Total number of payment gateway calls",
        &["operation", "status"]
    )
    .expect("Failed to register GATEWAY_CALLS")
});

pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "order_payment_db_query_duration_seconds",
        "Database query duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]
    )
    .expect("Failed to register DB_QUERY_DURATION")
});

/// Installs the HTTP metrics recorder and registers domain metrics.
pub fn init_metrics() -> anyhow::Result<()> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    if METRICS_HANDLE.set(handle).is_err() {
        anyhow::bail!("metrics recorder already initialized");
    }

    Lazy::force(&PAYMENT_INITIATIONS);
    Lazy::force(&PAYMENT_VERIFICATIONS);
    Lazy::force(&GATEWAY_CALLS);
    Lazy::force(&DB_QUERY_DURATION);
    Ok(())
}

/// Renders all metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let mut output = METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_default();

    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if encoder.encode(&prometheus::gather(), &mut buffer).is_ok() {
        output.push_str(&String::from_utf8_lossy(&buffer));
    }

    output
}

pub fn record_initiation(outcome: &str) {
    PAYMENT_INITIATIONS.with_label_values(&[outcome]).inc();
}

pub fn record_verification(outcome: &str) {
    PAYMENT_VERIFICATIONS.with_label_values(&[outcome]).inc();
}

pub fn record_gateway_call(operation: &str, status: &str) {
    GATEWAY_CALLS.with_label_values(&[operation, status]).inc();
}
