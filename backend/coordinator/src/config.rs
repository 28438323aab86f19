//! Application configuration loaded from environment variables.

use crate::errors::{Result, ServiceError};

#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite database location (e.g. `sqlite:./donations.db`)
    pub database_url: String,
    /// Port for the REST API server
    pub api_port: u16,
    /// Size of the SQLite connection pool
    pub max_connections: u32,
    /// Listing page size when the caller does not pass `limit`
    pub default_page_size: u32,
    /// Upper bound applied to a caller-supplied `limit`
    pub max_page_size: u32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let config = Config {
            database_url: env_var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:./donations.db".to_string()),
            api_port: parse_var("API_PORT", "3000")?,
            max_connections: parse_var("DB_MAX_CONNECTIONS", "5")?,
            default_page_size: parse_var("DEFAULT_PAGE_SIZE", "10")?,
            max_page_size: parse_var("MAX_PAGE_SIZE", "100")?,
        };

        if config.max_connections == 0 {
            return Err(ServiceError::Config(
                "DB_MAX_CONNECTIONS must be at least 1".to_string(),
            ));
        }
        if config.default_page_size == 0 || config.default_page_size > config.max_page_size {
            return Err(ServiceError::Config(
                "DEFAULT_PAGE_SIZE must be between 1 and MAX_PAGE_SIZE".to_string(),
            ));
        }
        Ok(config)
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, default: &str) -> Result<T> {
    env_var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .map_err(|_| ServiceError::Config(format!("Invalid {key}")))
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| ServiceError::Config(format!("Missing env var: {key}")))
}
