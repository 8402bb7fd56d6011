//! Error types shared across the template gateway crates.

use thiserror::Error;

/// Core error type for configuration and validation failures
#[derive(Error, Debug)]
pub enum CoreError {
    /// Configuration loading or validation failed
    #[error("Configuration error: {message}")]
    ConfigurationError {
        message: String,
        key: Option<String>,
    },

    /// A domain value failed validation
    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// Errors surfaced by `ComplianceStore` implementations
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Store backend error: {0}")]
    Backend(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
