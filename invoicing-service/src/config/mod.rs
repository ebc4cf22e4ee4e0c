//! Configuration module for invoicing-service.

use service_core::config::{self as core_config, env_list, env_or};
use service_core::error::AppError;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct InvoicingConfig {
    pub common: core_config::Config,
    pub service_name: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
    pub stock_service: StockServiceConfig,
    pub cors_allowed_origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone)]
pub struct StockServiceConfig {
    pub url: String,
    pub catalog_timeout: Duration,
    pub update_timeout: Duration,
}

impl InvoicingConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let mut common = core_config::Config::load()?;
        // INVOICING_SERVICE_PORT wins over the shared APP__PORT.
        common.port = env::var("INVOICING_SERVICE_PORT")
            .or_else(|_| env::var("APP__PORT"))
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3001);

        Ok(Self {
            common,
            service_name: env::var("SERVICE_NAME")
                .unwrap_or_else(|_| "invoicing-service".to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok(),
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").map_err(|_| {
                    AppError::ConfigError(anyhow::anyhow!("DATABASE_URL is required"))
                })?,
                max_connections: env_or("DATABASE_MAX_CONNECTIONS", 10),
                min_connections: env_or("DATABASE_MIN_CONNECTIONS", 2),
            },
            stock_service: StockServiceConfig {
                url: env::var("STOCK_SERVICE_URL")
                    .unwrap_or_else(|_| "http://stock-service:3000".to_string()),
                catalog_timeout: Duration::from_secs(env_or(
                    "STOCK_SERVICE_CATALOG_TIMEOUT_SECS",
                    30,
                )),
                update_timeout: Duration::from_secs(env_or("STOCK_SERVICE_UPDATE_TIMEOUT_SECS", 10)),
            },
            cors_allowed_origins: env_list("CORS_ALLOWED_ORIGINS", "http://localhost:4200"),
        })
    }
}
