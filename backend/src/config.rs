//! Configuration management for the stock ledger service
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (config/development.toml, config/production.toml)
//! 3. Environment variable overrides with STOCKLEDGER_ prefix

use config::{ConfigError, Environment, File};
use serde::Deserialize;
use shared::AgingThresholds;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// JWT authentication configuration
    pub jwt: JwtConfig,

    /// Allocation engine tuning
    #[serde(default)]
    pub ledger: LedgerConfig,

    /// Aging report thresholds
    #[serde(default)]
    pub aging: AgingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,

    /// Upper bound on waiting for an item or batch row lock
    pub lock_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtConfig {
    /// Secret key used to verify bearer tokens
    pub secret: String,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Draws of a random batch suffix before giving up with `Exhausted`
    pub batch_number_attempts: u32,

    /// Full re-executions of a transaction after a transient storage failure
    pub storage_retry_attempts: u32,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            batch_number_attempts: 10,
            storage_retry_attempts: 3,
        }
    }
}

/// Leave both unset for the binary good/empty report
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
pub struct AgingConfig {
    pub aging_after_days: Option<i64>,
    pub critical_after_days: Option<i64>,
}

impl AgingConfig {
    pub fn thresholds(&self) -> AgingThresholds {
        AgingThresholds {
            aging_after_days: self.aging_after_days,
            critical_after_days: self.critical_after_days,
        }
    }
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment =
            std::env::var("STOCKLEDGER_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("database.lock_timeout_ms", 5000)?
            .set_default("ledger.batch_number_attempts", 10)?
            .set_default("ledger.storage_retry_attempts", 3)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (STOCKLEDGER_ prefix)
            .add_source(
                Environment::with_prefix("STOCKLEDGER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.ledger.batch_number_attempts == 0 {
            return Err(ConfigError::Message(
                "ledger.batch_number_attempts must be at least 1".into(),
            ));
        }
        if let (Some(aging), Some(critical)) =
            (self.aging.aging_after_days, self.aging.critical_after_days)
        {
            if critical < aging {
                return Err(ConfigError::Message(
                    "aging.critical_after_days must not be below aging.aging_after_days".into(),
                ));
            }
        }
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            host: "0.0.0.0".to_string(),
        }
    }
}
