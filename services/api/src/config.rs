//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
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
    /// `None` runs the service on the in-memory document store.
    pub database_url: Option<String>,
    pub log_level: Level,
    pub media_root: PathBuf,
    pub media_base_url: String,
    pub cors_origin: String,
    pub max_upload_bytes: usize,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var_or = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.to_string());

        // --- Server and Database Settings ---
        let bind_address_str = var_or("BIND_ADDRESS", "0.0.0.0:3000");
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());

        let log_level_str = var_or("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Media Storage ---
        let media_root = PathBuf::from(var_or("MEDIA_ROOT", "./media"));
        let media_base_url = var_or("MEDIA_BASE_URL", "http://localhost:3000/media")
            .trim_end_matches('/')
            .to_string();

        let max_upload_str = var_or("MAX_UPLOAD_BYTES", "104857600");
        let max_upload_bytes = max_upload_str.parse::<usize>().map_err(|_| {
            ConfigError::InvalidValue(
                "MAX_UPLOAD_BYTES".to_string(),
                format!("'{}' is not a byte count", max_upload_str),
            )
        })?;

        // --- Browser Access ---
        let cors_origin = var_or("CORS_ORIGIN", "http://localhost:5173");

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            media_root,
            media_base_url,
            cors_origin,
            max_upload_bytes,
        })
    }
}
