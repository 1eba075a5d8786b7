//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development. The resulting struct is wrapped in an
//! `Arc` and handed to collaborators explicitly; nothing reads the environment
//! after startup.

use std::net::SocketAddr;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    /// Signs auth session cookies (HMAC-SHA256).
    pub secret_key: String,
    pub openai_api_key: Option<String>,
    pub chat_model: String,
    pub summary_model: String,
    pub sentiment_model: String,
    pub mercadopago_access_token: String,
    /// Public base URL of the frontend, used for checkout back-URLs.
    pub frontend_url: String,
    /// Where the gateway should POST payment notifications, if configured.
    pub payment_notification_url: Option<String>,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Load Server and Database Settings ---
        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Load Secrets ---
        let secret_key = std::env::var("SECRET_KEY")
            .map_err(|_| ConfigError::MissingVar("SECRET_KEY".to_string()))?;
        let openai_api_key = std::env::var("OPENAI_API_KEY").ok();
        let mercadopago_access_token = std::env::var("MERCADOPAGO_ACCESS_TOKEN")
            .map_err(|_| ConfigError::MissingVar("MERCADOPAGO_ACCESS_TOKEN".to_string()))?;

        // --- Load Adapter-specific Settings ---
        let chat_model =
            std::env::var("CHAT_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
        let summary_model =
            std::env::var("SUMMARY_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
        let sentiment_model =
            std::env::var("SENTIMENT_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());

        let frontend_url = std::env::var("FRONTEND_URL")
            .map_err(|_| ConfigError::MissingVar("FRONTEND_URL".to_string()))?;
        let payment_notification_url = std::env::var("PAYMENT_NOTIFICATION_URL").ok();

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            secret_key,
            openai_api_key,
            chat_model,
            summary_model,
            sentiment_model,
            mercadopago_access_token,
            frontend_url,
            payment_notification_url,
        })
    }
}
