//! Server configuration management.
//!
//! Consolidates all environment variable reads and provides validated configuration.

use sportsbook_ledger::config::ConfigError;
use sportsbook_ledger::db::DatabaseConfig;
use sportsbook_ledger::LedgerConfig;
use std::net::SocketAddr;
use std::str::FromStr;

const DEFAULT_BIND: &str = "127.0.0.1:6969";

/// Where the ledger keeps its state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StorageBackend::Postgres),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(ConfigError::Invalid {
                var: "LEDGER_STORAGE".to_string(),
                reason: format!("Unknown backend '{other}', expected postgres or memory"),
            }),
        }
    }
}

/// Complete server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server bind address
    pub bind: SocketAddr,
    /// Storage backend
    pub storage: StorageBackend,
    /// Database configuration, present for the postgres backend
    pub database: Option<DatabaseConfig>,
    /// Ledger tunables
    pub ledger: LedgerConfig,
    /// Prometheus scrape address; metrics are off when unset
    pub metrics_bind: Option<SocketAddr>,
}

/// Values given on the command line, which win over the environment
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub bind: Option<SocketAddr>,
    pub database_url: Option<String>,
    pub memory: bool,
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns error if required variables are missing or invalid
    pub fn from_env(overrides: CliOverrides) -> Result<Self, ConfigError> {
        let bind = match overrides.bind {
            Some(bind) => bind,
            None => parse_addr("SERVER_BIND")?.unwrap_or(default_bind()),
        };

        let storage = if overrides.memory {
            StorageBackend::Memory
        } else {
            std::env::var("LEDGER_STORAGE")
                .ok()
                .map(|v| v.parse())
                .transpose()?
                .unwrap_or(StorageBackend::Postgres)
        };

        let database = match (storage, overrides.database_url) {
            (StorageBackend::Memory, _) => None,
            (StorageBackend::Postgres, Some(url)) => Some(DatabaseConfig::with_url(url)),
            (StorageBackend::Postgres, None) => Some(DatabaseConfig::from_env()?),
        };

        let config = ServerConfig {
            bind,
            storage,
            database,
            ledger: LedgerConfig::from_env()?,
            metrics_bind: parse_addr("METRICS_BIND")?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(database) = &self.database {
            database.validate()?;
        }

        if self.storage == StorageBackend::Postgres && self.database.is_none() {
            return Err(ConfigError::MissingRequired {
                var: "DATABASE_URL".to_string(),
                hint: "Set it, or run with --memory".to_string(),
            });
        }

        if self.metrics_bind == Some(self.bind) {
            return Err(ConfigError::Invalid {
                var: "METRICS_BIND".to_string(),
                reason: format!("Must differ from the server address ({})", self.bind),
            });
        }

        self.ledger.validate()
    }
}

fn default_bind() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 6969))
}

fn parse_addr(var: &str) -> Result<Option<SocketAddr>, ConfigError> {
    match std::env::var(var) {
        Ok(value) => value
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid {
                var: var.to_string(),
                reason: format!("'{value}' is not an IP:PORT address, e.g. {DEFAULT_BIND}"),
            }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_config() -> ServerConfig {
        ServerConfig {
            bind: "127.0.0.1:8080".parse().unwrap(),
            storage: StorageBackend::Memory,
            database: None,
            ledger: LedgerConfig::default(),
            metrics_bind: None,
        }
    }

    #[test]
    fn test_storage_backend_parse() {
        assert_eq!(
            "postgres".parse::<StorageBackend>().unwrap(),
            StorageBackend::Postgres
        );
        assert_eq!(
            "MEMORY".parse::<StorageBackend>().unwrap(),
            StorageBackend::Memory
        );
        assert!(matches!(
            "sqlite".parse::<StorageBackend>(),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn test_memory_config_is_valid() {
        assert!(memory_config().validate().is_ok());
    }

    #[test]
    fn test_postgres_requires_database() {
        let config = ServerConfig {
            storage: StorageBackend::Postgres,
            ..memory_config()
        };
        assert!(matches!(
            config.validate().unwrap_err(),
            ConfigError::MissingRequired { .. }
        ));
    }

    #[test]
    fn test_metrics_bind_must_differ() {
        let config = ServerConfig {
            metrics_bind: Some("127.0.0.1:8080".parse().unwrap()),
            ..memory_config()
        };
        assert!(matches!(
            config.validate().unwrap_err(),
            ConfigError::Invalid { .. }
        ));
    }

    #[test]
    fn test_ledger_config_is_validated() {
        let mut config = memory_config();
        config.ledger.history_limit = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_bind() {
        assert_eq!(default_bind().to_string(), DEFAULT_BIND);
    }
}
