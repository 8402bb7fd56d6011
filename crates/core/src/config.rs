//! Configuration loading for template gateway services
//!
//! Environment variable parsing with validation and `.env` file support. All
//! configuration uses the `TEMPLATE_GATEWAY_` prefix, with bare fallbacks for
//! the common deployment variables (`HOST`, `PORT`, `WEBHOOK_VERIFY_TOKEN`).
//!
//! # Example
//!
//! ```no_run
//! use template_gateway_core::config::{load_dotenv, ConfigLoader, ServiceConfig, WebhookConfig};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! load_dotenv();
//! let service = ServiceConfig::from_env()?;
//! let webhook = WebhookConfig::from_env()?;
//! service.validate()?;
//! webhook.validate()?;
//! # Ok(())
//! # }
//! ```

use crate::error::CoreError;
use std::time::Duration;
use url::Url;

/// Configuration loader trait
///
/// Standardized loading and validation of configuration from environment
/// variables.
pub trait ConfigLoader: Sized {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` if a required variable is missing or a
    /// value cannot be parsed.
    fn from_env() -> Result<Self, CoreError>;

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` if any validation check fails.
    fn validate(&self) -> Result<(), CoreError>;
}

/// HTTP service configuration
///
/// # Environment Variables
///
/// - `TEMPLATE_GATEWAY_HOST` (optional): Bind address (default: 0.0.0.0)
/// - `TEMPLATE_GATEWAY_PORT` (optional): Bind port (default: 8080)
/// - `TEMPLATE_GATEWAY_WORKERS` (optional): HTTP worker count (default: number of CPUs)
/// - `TEMPLATE_GATEWAY_SHUTDOWN_GRACE_SECS` (optional): Graceful shutdown window (default: 10)
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub workers: usize,
    pub shutdown_grace: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            workers: num_cpus::get(),
            shutdown_grace: Duration::from_secs(10),
        }
    }
}

impl ConfigLoader for ServiceConfig {
    fn from_env() -> Result<Self, CoreError> {
        let host = std::env::var("TEMPLATE_GATEWAY_HOST")
            .or_else(|_| std::env::var("HOST"))
            .unwrap_or_else(|_| ServiceConfig::default().host);

        let port = match std::env::var("TEMPLATE_GATEWAY_PORT").or_else(|_| std::env::var("PORT"))
        {
            Ok(raw) => raw
                .parse::<u16>()
                .map_err(|e| CoreError::ConfigurationError {
                    message: format!("Failed to parse port: {}", e),
                    key: Some("TEMPLATE_GATEWAY_PORT".to_string()),
                })?,
            Err(_) => ServiceConfig::default().port,
        };

        let workers = parse_env_var("TEMPLATE_GATEWAY_WORKERS", ServiceConfig::default().workers)?;
        let grace_secs = parse_env_var("TEMPLATE_GATEWAY_SHUTDOWN_GRACE_SECS", 10u64)?;

        Ok(Self {
            host,
            port,
            workers,
            shutdown_grace: Duration::from_secs(grace_secs),
        })
    }

    fn validate(&self) -> Result<(), CoreError> {
        // Reuse the URL parser for bind address sanity
        Url::parse(&format!("http://{}:{}", self.host, self.port)).map_err(|e| {
            CoreError::ConfigurationError {
                message: format!("Invalid bind address: {}", e),
                key: Some("TEMPLATE_GATEWAY_HOST".to_string()),
            }
        })?;

        if self.port == 0 {
            return Err(CoreError::ConfigurationError {
                message: "port must be greater than 0".to_string(),
                key: Some("TEMPLATE_GATEWAY_PORT".to_string()),
            });
        }

        if self.workers == 0 {
            return Err(CoreError::ConfigurationError {
                message: "workers must be greater than 0".to_string(),
                key: Some("TEMPLATE_GATEWAY_WORKERS".to_string()),
            });
        }

        Ok(())
    }
}

/// Webhook verification configuration
///
/// # Environment Variables
///
/// - `TEMPLATE_GATEWAY_WEBHOOK_VERIFY_TOKEN` (required): Subscription handshake token
/// - `TEMPLATE_GATEWAY_WEBHOOK_APP_SECRET` (optional): HMAC secret for
///   `X-Hub-Signature-256` payload verification; signatures are not checked
///   when unset
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    pub verify_token: String,
    pub app_secret: Option<String>,
}

impl ConfigLoader for WebhookConfig {
    fn from_env() -> Result<Self, CoreError> {
        let verify_token = std::env::var("TEMPLATE_GATEWAY_WEBHOOK_VERIFY_TOKEN")
            .or_else(|_| std::env::var("WEBHOOK_VERIFY_TOKEN"))
            .map_err(|_| CoreError::ConfigurationError {
                message: "WEBHOOK_VERIFY_TOKEN or TEMPLATE_GATEWAY_WEBHOOK_VERIFY_TOKEN must be set"
                    .to_string(),
                key: Some("TEMPLATE_GATEWAY_WEBHOOK_VERIFY_TOKEN".to_string()),
            })?;

        let app_secret = std::env::var("TEMPLATE_GATEWAY_WEBHOOK_APP_SECRET")
            .or_else(|_| std::env::var("WEBHOOK_APP_SECRET"))
            .ok();

        Ok(Self {
            verify_token,
            app_secret,
        })
    }

    fn validate(&self) -> Result<(), CoreError> {
        if self.verify_token.trim().is_empty() {
            return Err(CoreError::ConfigurationError {
                message: "verify_token must not be empty".to_string(),
                key: Some("TEMPLATE_GATEWAY_WEBHOOK_VERIFY_TOKEN".to_string()),
            });
        }

        if let Some(secret) = &self.app_secret {
            if secret.len() < 8 {
                return Err(CoreError::ConfigurationError {
                    message: "app_secret must be at least 8 characters".to_string(),
                    key: Some("TEMPLATE_GATEWAY_WEBHOOK_APP_SECRET".to_string()),
                });
            }
        }

        Ok(())
    }
}

/// Parse an environment variable with a default value
///
/// # Errors
///
/// Returns a `ConfigurationError` if the value cannot be parsed
fn parse_env_var<T>(key: &str, default: T) -> Result<T, CoreError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    std::env::var(key)
        .ok()
        .map(|v| {
            v.parse::<T>().map_err(|e| CoreError::ConfigurationError {
                message: format!("Failed to parse {}: {}", key, e),
                key: Some(key.to_string()),
            })
        })
        .unwrap_or(Ok(default))
}

/// Load .env file if present
///
/// Does not return an error if the .env file is not found.
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}
