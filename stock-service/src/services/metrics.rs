//! Prometheus metrics for stock-service.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, HistogramVec, TextEncoder,
};

/// Balance update counter by outcome.
pub static STOCK_DECREMENTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "stock_decrements_total",
        "Total number of balance update requests",
        &["outcome"]  // ok, insufficient_stock, product_not_found, ...
    )
    .expect("Failed to register stock_decrements_total")
});

/// Product counter.
pub static PRODUCTS_CREATED: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "stock_products_created_total",
        "Total number of product create requests",
        &["status"]
    )
    .expect("Failed to register products_created")
});

/// Error counter for alerting.
pub static ERRORS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "stock_errors_total",
        "Total number of errors by type",
        &["error_type"]
    )
    .expect("Failed to register errors_total")
});

/// Database query duration histogram.
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "stock_db_query_duration_seconds",
        "Database query duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .expect("Failed to register db_query_duration")
});

/// Initialize all metrics (forces lazy initialization).
pub fn init_metrics() {
    Lazy::force(&STOCK_DECREMENTS_TOTAL);
    Lazy::force(&PRODUCTS_CREATED);
    Lazy::force(&ERRORS_TOTAL);
    Lazy::force(&DB_QUERY_DURATION);
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder
        .encode_to_string(&metric_families)
        .unwrap_or_default()
}
