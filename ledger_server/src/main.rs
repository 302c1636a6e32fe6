//! Sportsbook ledger server.
//!
//! Serves the ledger's JSON API backed by PostgreSQL, or by the in-process
//! store with `--memory`.

use std::net::SocketAddr;

use anyhow::{Context, Error};
use ledger_server::api::{self, AppState};
use ledger_server::config::{CliOverrides, ServerConfig, StorageBackend};
use ledger_server::{logging, metrics};
use pico_args::Arguments;
use sportsbook_ledger::Ledger;
use sportsbook_ledger::db::Database;
use tracing::info;

const HELP: &str = "\
Run the sportsbook ledger server

USAGE:
  ledger_server [OPTIONS]

OPTIONS:
  --bind       IP:PORT     Server socket bind address  [default: env SERVER_BIND or 127.0.0.1:6969]
  --db-url     URL         Database connection string  [default: env DATABASE_URL]

FLAGS:
  --memory                 Keep the ledger in process memory (nothing is persisted)
  -h, --help               Print help information

ENVIRONMENT:
  SERVER_BIND              Server bind address (e.g., 0.0.0.0:8080)
  DATABASE_URL             PostgreSQL connection string
  LEDGER_STORAGE           postgres | memory
  METRICS_BIND             Prometheus scrape address (e.g., 0.0.0.0:9090)
  LEDGER_LOCK_TIMEOUT_MS   Longest wait for an account lock
  (See .env file for all configuration options)
";

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let overrides = CliOverrides {
        memory: pargs.contains("--memory"),
        bind: pargs
            .opt_value_from_str::<_, SocketAddr>("--bind")
            .context("Invalid --bind address")?,
        database_url: pargs
            .opt_value_from_str("--db-url")
            .context("Invalid --db-url")?,
    };

    logging::init();

    let config = ServerConfig::from_env(overrides).context("Invalid configuration")?;

    if let Some(addr) = config.metrics_bind {
        metrics::init_metrics(addr).map_err(Error::msg)?;
        info!("Prometheus metrics at http://{}/metrics", addr);
    }

    let (ledger, database) = match (config.storage, &config.database) {
        (StorageBackend::Postgres, Some(db_config)) => {
            info!("Connecting to database");
            let db = Database::new(db_config)
                .await
                .context("Failed to connect to database")?;
            db.migrate().await.context("Failed to run migrations")?;
            info!("Database connected and migrated");
            (Ledger::connect(&db, &config.ledger), Some(db))
        }
        _ => {
            info!("Using the in-memory ledger; balances are lost on exit");
            (Ledger::in_memory(&config.ledger), None)
        }
    };

    let app = api::create_router(AppState { ledger });

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind))?;

    info!(
        "Server is running at http://{}. Press Ctrl+C to stop.",
        config.bind
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Shutting down server...");
    if let Some(db) = database {
        db.close().await;
    }

    Ok(())
}

/// Graceful shutdown signal
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install CTRL+C signal handler: {}", e);
        std::future::pending::<()>().await;
    }
}
