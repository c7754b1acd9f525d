use std::net::SocketAddr;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Which `PracticeBackend` implementation the gateway talks to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BackendKind {
    /// The in-memory stub: reference catalog, canned replies.
    Stub,
    /// The real practice service over HTTP.
    Http,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub backend: BackendKind,
    pub practice_api_url: Option<String>,
    pub log_level: Level,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let backend_str = std::env::var("BACKEND").unwrap_or_else(|_| "stub".to_string());
        let backend = match backend_str.to_lowercase().as_str() {
            "http" => BackendKind::Http,
            _ => BackendKind::Stub,
        };

        let practice_api_url = std::env::var("PRACTICE_API_URL").ok();
        if backend == BackendKind::Http && practice_api_url.is_none() {
            return Err(ConfigError::MissingVar(
                "PRACTICE_API_URL must be set for the 'http' backend".to_string(),
            ));
        }

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            bind_address,
            backend,
            practice_api_url,
            log_level,
        })
    }
}
