//! Configuration management for the print supplies inventory
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (development.toml, production.toml)
//! 3. Environment variable overrides with PSI_ prefix

use config::{ConfigError, Environment, File};
use serde::Deserialize;

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

    /// Report composition settings
    pub reports: ReportsConfig,

    /// Search settings
    pub search: SearchConfig,

    /// Notification threshold defaults
    pub notifications: NotificationsConfig,

    /// Backup settings
    pub backup: BackupConfig,
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
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtConfig {
    /// Secret key used to verify session tokens
    pub secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReportsConfig {
    /// Row cap applied to every report and export query
    pub max_records: i64,

    /// Combined stock at or below which an item counts as low
    pub low_stock_threshold: i64,

    /// Prefix for monetary values
    pub currency_symbol: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    /// Rows per table when the caller gives no limit
    pub default_limit: i64,

    /// Window used by the popular searches list
    pub popular_window_days: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NotificationsConfig {
    pub low_stock_threshold: i64,
    pub pending_return_days: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BackupConfig {
    /// Directory receiving compressed dumps
    pub directory: String,

    /// Path to the pg_dump executable
    pub pg_dump_path: String,

    /// Age after which backups become eligible for cleanup
    pub max_age_days: i64,

    /// Backups always kept regardless of age
    pub min_keep: usize,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment = std::env::var("PSI_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 8080)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 1)?
            .set_default("reports.max_records", 5000)?
            .set_default("reports.low_stock_threshold", shared::DEFAULT_LOW_STOCK_THRESHOLD)?
            .set_default("reports.currency_symbol", "₱")?
            .set_default("search.default_limit", shared::DEFAULT_SEARCH_LIMIT)?
            .set_default("search.popular_window_days", 30)?
            .set_default("notifications.low_stock_threshold", shared::DEFAULT_LOW_STOCK_THRESHOLD)?
            .set_default("notifications.pending_return_days", shared::DEFAULT_PENDING_RETURN_DAYS)?
            .set_default("backup.directory", "backups")?
            .set_default("backup.pg_dump_path", "pg_dump")?
            .set_default("backup.max_age_days", shared::DEFAULT_MAX_AGE_DAYS)?
            .set_default("backup.min_keep", shared::DEFAULT_MIN_KEEP as i64)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (PSI_ prefix)
            .add_source(
                Environment::with_prefix("PSI")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}
