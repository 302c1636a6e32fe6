//! Prometheus metrics for the ledger server.
//!
//! Metrics are exposed in Prometheus text format on a dedicated scrape
//! listener. Without an installed exporter every recording call is a no-op.
//!
//! # Metrics Categories
//!
//! - **HTTP Metrics**: Request counts, duration, status codes
//! - **Ledger Metrics**: Failed operations by error code, money moved
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use ledger_server::metrics;
//! use std::net::SocketAddr;
//!
//! let addr: SocketAddr = "127.0.0.1:9090".parse().unwrap();
//! metrics::init_metrics(addr).unwrap();
//!
//! metrics::http_requests_total("POST", "/api/v1/transfers", 200);
//! metrics::ledger_errors_total("insufficient_funds");
//! ```

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Initialize Prometheus metrics exporter.
///
/// Metrics will be available at `http://<addr>/metrics`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {}", e))
}

// ============================================================================
// HTTP Metrics
// ============================================================================

/// Record HTTP request.
pub fn http_requests_total(method: &str, path: &str, status: u16) {
    metrics::counter!("http_requests_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record HTTP request duration in milliseconds.
pub fn http_request_duration_ms(method: &str, path: &str, duration_ms: f64) {
    metrics::histogram!("http_request_duration_ms",
        "method" => method.to_string(),
        "path" => path.to_string()
    )
    .record(duration_ms);
}

// ============================================================================
// Ledger Metrics
// ============================================================================

/// Increment the failed ledger operations counter for an error code.
pub fn ledger_errors_total(code: &str) {
    metrics::counter!("ledger_errors_total",
        "code" => code.to_string()
    )
    .increment(1);
}

/// Record a committed money movement by kind (bet, payout, transfer, ...).
pub fn ledger_movements_total(kind: &str) {
    metrics::counter!("ledger_movements_total",
        "kind" => kind.to_string()
    )
    .increment(1);
}
