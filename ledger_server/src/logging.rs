//! Structured logging configuration.
//!
//! The ledger library logs through the `log` facade; the subscriber installed
//! here bridges those records so they share the request-scoped output.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Default filter when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "info,sqlx=warn,hyper=warn";

/// Initialize structured logging
///
/// Log levels are configurable via the `RUST_LOG` env var.
///
/// # Example
///
/// ```no_run
/// use ledger_server::logging;
///
/// #[tokio::main]
/// async fn main() {
///     logging::init();
///     tracing::info!("Server starting");
/// }
/// ```
pub fn init() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    tracing::info!("Structured logging initialized");
}

/// Log a ledger operation that failed with a client-visible error
///
/// Conflicts and internal failures are logged at `warn`, business
/// rejections (insufficient funds, bad transitions) at `debug`.
pub fn log_ledger_error(operation: &str, code: &str, message: &str) {
    match code {
        "internal" | "concurrency_conflict" => tracing::warn!(
            operation = operation,
            code = code,
            "Ledger operation failed: {}",
            message
        ),
        _ => tracing::debug!(
            operation = operation,
            code = code,
            "Ledger operation rejected: {}",
            message
        ),
    }
}

/// Log API request/response
pub fn log_api_request(method: &str, path: &str, status_code: u16, duration_ms: u64) {
    if duration_ms > 1000 {
        tracing::warn!(
            http_method = method,
            http_path = path,
            http_status = status_code,
            duration_ms = duration_ms,
            "Slow API request"
        );
    } else {
        tracing::info!(
            http_method = method,
            http_path = path,
            http_status = status_code,
            duration_ms = duration_ms,
            "API request completed"
        );
    }
}
