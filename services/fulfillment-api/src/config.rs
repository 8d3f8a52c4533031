//! Configuration for the Fulfillment API service.

use milkway_core::FulfillmentConfig;
use std::time::Duration;

/// Fulfillment API configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub http_port: u16,
    /// Database URL
    pub database_url: String,
    /// Fulfillment engine configuration
    pub fulfillment: FulfillmentConfig,
    /// Request timeout
    pub request_timeout: Duration,
    /// Notification channel depth
    pub notice_queue_depth: usize,
    /// Metrics enabled
    pub metrics_enabled: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Database
        let database_url =
            std::env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;

        // Server port
        let http_port = std::env::var("HTTP_PORT")
            .unwrap_or_else(|_| "8082".to_string())
            .parse()
            .map_err(|_| ConfigError::Invalid("HTTP_PORT"))?;

        // Engine tuning
        let grace_window_days: u32 = std::env::var("GRACE_WINDOW_DAYS")
            .unwrap_or_else(|_| "1".to_string())
            .parse()
            .map_err(|_| ConfigError::Invalid("GRACE_WINDOW_DAYS"))?;

        let sweep_horizon_days: u32 = std::env::var("SWEEP_HORIZON_DAYS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .map_err(|_| ConfigError::Invalid("SWEEP_HORIZON_DAYS"))?;

        let op_timeout_secs: u64 = std::env::var("OP_TIMEOUT_SECS")
            .unwrap_or_else(|_| "5".to_string())
            .parse()
            .map_err(|_| ConfigError::Invalid("OP_TIMEOUT_SECS"))?;

        // Request timeout
        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .map_err(|_| ConfigError::Invalid("REQUEST_TIMEOUT_SECS"))?;

        // Notifications
        let notice_queue_depth: usize = std::env::var("NOTICE_QUEUE_DEPTH")
            .unwrap_or_else(|_| "1024".to_string())
            .parse()
            .map_err(|_| ConfigError::Invalid("NOTICE_QUEUE_DEPTH"))?;

        // Metrics
        let metrics_enabled = std::env::var("METRICS_ENABLED")
            .unwrap_or_else(|_| "true".to_string())
            .parse()
            .unwrap_or(true);

        let fulfillment = FulfillmentConfig::new()
            .with_grace_window_days(grace_window_days)
            .with_sweep_horizon_days(sweep_horizon_days)
            .with_op_timeout(Duration::from_secs(op_timeout_secs));

        Ok(Self {
            http_port,
            database_url,
            fulfillment,
            request_timeout: Duration::from_secs(request_timeout_secs),
            notice_queue_depth,
            metrics_enabled,
        })
    }
}

/// Configuration error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}
